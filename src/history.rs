// src/history.rs
//! Completed workouts kept locally, most recent first.
use crate::session::FinishedWorkout;
use crate::storage::{JsonStore, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const HISTORY_KEY: &str = "gym-app-workout-history";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSet {
    pub weight: Option<f64>,
    pub reps: Option<i64>,
    pub completed: bool,
}

impl SavedSet {
    /// Completed with a positive weight and rep count.
    #[must_use]
    pub fn qualifies(&self) -> bool {
        self.completed
            && self.weight.is_some_and(|w| w > 0.0)
            && self.reps.is_some_and(|r| r > 0)
    }

    #[must_use]
    pub fn volume(&self) -> f64 {
        match (self.qualifies(), self.weight, self.reps) {
            (true, Some(w), Some(r)) => w * r as f64,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedExercise {
    pub name: String,
    pub sets: Vec<SavedSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedWorkout {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    /// Seconds.
    pub duration: u64,
    pub exercises: Vec<SavedExercise>,
    pub volume: f64,
    pub rating: Option<u8>,
    pub notes: Option<String>,
}

impl SavedWorkout {
    /// Flattens a finished session into the history shape. The workout is
    /// dated by its completion time.
    #[must_use]
    pub fn from_finished(finished: &FinishedWorkout) -> Self {
        let session = &finished.session;
        let exercises: Vec<SavedExercise> = finished
            .exercise_logs
            .iter()
            .map(|log| SavedExercise {
                name: log.exercise.name.clone(),
                sets: log
                    .sets
                    .iter()
                    .map(|s| SavedSet {
                        weight: s.weight_kg,
                        reps: s.reps,
                        completed: s.is_completed(),
                    })
                    .collect(),
            })
            .collect();
        let volume = exercises
            .iter()
            .flat_map(|e| e.sets.iter())
            .map(SavedSet::volume)
            .sum();

        Self {
            id: session.id.clone(),
            name: session.name.clone(),
            date: session.completed_at.unwrap_or(session.started_at),
            duration: session.duration_sec.unwrap_or(0),
            exercises,
            volume,
            rating: session.rating,
            notes: session.notes.clone(),
        }
    }

    #[must_use]
    pub fn completed_sets(&self) -> usize {
        self.exercises
            .iter()
            .map(|e| e.sets.iter().filter(|s| s.completed).count())
            .sum()
    }
}

#[derive(Debug)]
pub struct WorkoutHistory {
    store: JsonStore,
    workouts: Vec<SavedWorkout>,
}

impl WorkoutHistory {
    /// Reads the stored history. Missing or corrupt data yields an empty history.
    pub fn load(store: JsonStore) -> Self {
        let workouts = store.load_or(HISTORY_KEY, Vec::new());
        Self { store, workouts }
    }

    pub fn workouts(&self) -> &[SavedWorkout] {
        &self.workouts
    }

    pub fn get(&self, id: &str) -> Option<&SavedWorkout> {
        self.workouts.iter().find(|w| w.id == id)
    }

    /// Inserts at the front (most recent first) and persists. A failed write
    /// leaves the in-memory history unchanged.
    pub fn add(&mut self, workout: SavedWorkout) -> Result<(), StorageError> {
        info!("Saving workout '{}' ({}) to history", workout.name, workout.id);
        self.workouts.insert(0, workout);
        if let Err(e) = self.save() {
            self.workouts.remove(0);
            return Err(e);
        }
        Ok(())
    }

    /// Returns `false` if no workout had that id.
    pub fn delete(&mut self, id: &str) -> Result<bool, StorageError> {
        let before = self.workouts.len();
        self.workouts.retain(|w| w.id != id);
        if self.workouts.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn update_rating(&mut self, id: &str, rating: u8) -> Result<bool, StorageError> {
        match self.workouts.iter_mut().find(|w| w.id == id) {
            Some(workout) => {
                workout.rating = Some(rating);
                self.save()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn save(&self) -> Result<(), StorageError> {
        self.store.write(HISTORY_KEY, &self.workouts)
    }
}
