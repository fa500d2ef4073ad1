// src/templates.rs
//! Saved workout templates, seeded with four built-in splits.
use crate::storage::{JsonStore, StorageError};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const TEMPLATES_KEY: &str = "gym-app-workout-templates";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateExercise {
    pub name: String,
    pub sets: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_reps: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutTemplate {
    pub id: String,
    pub name: String,
    pub exercises: Vec<TemplateExercise>,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub exercises: Option<Vec<TemplateExercise>>,
}

fn ex(name: &str, sets: u32, reps: i64) -> TemplateExercise {
    TemplateExercise {
        name: name.to_string(),
        sets,
        default_weight: None,
        default_reps: Some(reps),
    }
}

fn template(id: &str, name: &str, exercises: Vec<TemplateExercise>) -> WorkoutTemplate {
    WorkoutTemplate {
        id: id.to_string(),
        name: name.to_string(),
        exercises,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
        last_used: None,
    }
}

/// Push/Pull/Leg/Full Body starter templates.
#[must_use]
pub fn default_templates() -> Vec<WorkoutTemplate> {
    vec![
        template(
            "push-day",
            "Push Day",
            vec![
                ex("Bench Press", 4, 8),
                ex("Incline Dumbbell Press", 3, 10),
                ex("Shoulder Press", 3, 10),
                ex("Lateral Raise", 3, 12),
                ex("Tricep Pushdown", 3, 12),
                ex("Overhead Tricep Extension", 3, 12),
            ],
        ),
        template(
            "pull-day",
            "Pull Day",
            vec![
                ex("Deadlift", 4, 6),
                ex("Barbell Row", 4, 8),
                ex("Lat Pulldown", 3, 10),
                ex("Seated Cable Row", 3, 10),
                ex("Barbell Curl", 3, 10),
            ],
        ),
        template(
            "leg-day",
            "Leg Day",
            vec![
                ex("Squat", 4, 8),
                ex("Romanian Deadlift", 3, 10),
                ex("Leg Press", 3, 12),
                ex("Leg Curl", 3, 12),
                ex("Leg Extension", 3, 12),
                ex("Standing Calf Raise", 4, 15),
                ex("Seated Calf Raise", 3, 15),
            ],
        ),
        template(
            "full-body",
            "Full Body",
            vec![
                ex("Squat", 3, 8),
                ex("Bench Press", 3, 8),
                ex("Barbell Row", 3, 8),
                ex("Shoulder Press", 3, 10),
                ex("Romanian Deadlift", 3, 10),
                ex("Lat Pulldown", 3, 10),
                ex("Barbell Curl", 2, 12),
                ex("Tricep Pushdown", 2, 12),
                ex("Standing Calf Raise", 3, 15),
                ex("Plank", 3, 60),
            ],
        ),
    ]
}

#[derive(Debug)]
pub struct TemplateLibrary {
    store: JsonStore,
    templates: Vec<WorkoutTemplate>,
}

impl TemplateLibrary {
    /// Reads stored templates. When nothing usable is stored the defaults are
    /// written back so the file exists from then on.
    pub fn load(store: JsonStore) -> Result<Self, StorageError> {
        match store.load::<Vec<WorkoutTemplate>>(TEMPLATES_KEY) {
            Some(templates) => Ok(Self { store, templates }),
            None => {
                let library = Self {
                    store,
                    templates: default_templates(),
                };
                library.save()?;
                Ok(library)
            }
        }
    }

    pub fn templates(&self) -> &[WorkoutTemplate] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Option<&WorkoutTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Appends a new template with a `custom-<millis>` id.
    pub fn add(
        &mut self,
        name: &str,
        exercises: Vec<TemplateExercise>,
        now: DateTime<Utc>,
    ) -> Result<&WorkoutTemplate, StorageError> {
        let mut millis = now.timestamp_millis();
        while self.get(&format!("custom-{millis}")).is_some() {
            millis += 1;
        }
        let template = WorkoutTemplate {
            id: format!("custom-{millis}"),
            name: name.trim().to_string(),
            exercises,
            created_at: now,
            last_used: None,
        };
        info!("Adding template '{}' ({})", template.name, template.id);
        self.templates.push(template);
        self.save()?;
        Ok(&self.templates[self.templates.len() - 1])
    }

    pub fn update(&mut self, id: &str, update: TemplateUpdate) -> Result<bool, StorageError> {
        let Some(template) = self.templates.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };
        if let Some(name) = update.name {
            template.name = name;
        }
        if let Some(exercises) = update.exercises {
            template.exercises = exercises;
        }
        self.save()?;
        Ok(true)
    }

    pub fn delete(&mut self, id: &str) -> Result<bool, StorageError> {
        let before = self.templates.len();
        self.templates.retain(|t| t.id != id);
        if before == self.templates.len() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn mark_used(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), StorageError> {
        match self.templates.iter_mut().find(|t| t.id == id) {
            Some(template) => {
                template.last_used = Some(now);
                self.save()
            }
            None => {
                warn!("Cannot mark unknown template '{}' as used", id);
                Ok(())
            }
        }
    }

    fn save(&self) -> Result<(), StorageError> {
        self.store.write(TEMPLATES_KEY, &self.templates)
    }
}
