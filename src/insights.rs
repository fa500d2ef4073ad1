// src/insights.rs
//! Prompt construction and response parsing for AI workout plans and
//! history insights.
use crate::ai_client::{AiError, TextGenerator};
use crate::history::SavedWorkout;
use crate::library::{
    exercises_for_equipment, find_exercise, Equipment, ExerciseCategory, ExerciseDefinition,
    ExperienceLevel, MuscleGroup, WorkoutType,
};
use chrono::{DateTime, Datelike, Duration, Local, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const ALLOWED_DURATIONS: [u32; 5] = [30, 45, 60, 75, 90];
const MIN_AVAILABLE_EXERCISES: usize = 3;
const SUMMARY_WINDOW_DAYS: i64 = 30;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Not enough exercises available for the selected options. Try selecting more equipment.")]
    NotEnoughExercises,
    #[error("Failed to generate response: {0}")]
    Generation(#[from] AiError),
    #[error("Invalid format from AI: {0}")]
    MalformedResponse(String),
    #[error("Failed to encode prompt data: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TrainingGoal {
    Strength,
    Hypertrophy,
    Endurance,
    #[default]
    General,
}

impl TrainingGoal {
    pub const fn guidance(self) -> &'static str {
        match self {
            Self::Strength => "3-5 sets of 3-6 reps, 3-5 minutes rest between sets. Focus on compound movements.",
            Self::Hypertrophy => "3-4 sets of 8-12 reps, 60-90 seconds rest between sets. Mix compound and isolation.",
            Self::Endurance => "2-3 sets of 15-20 reps, 30-60 seconds rest between sets. Higher volume, lower weight.",
            Self::General => "3 sets of 8-12 reps, 60-90 seconds rest. Balanced approach.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentWorkout {
    pub name: String,
    pub exercises: Vec<String>,
}

impl RecentWorkout {
    pub fn from_saved(workout: &SavedWorkout) -> Self {
        Self {
            name: workout.name.clone(),
            exercises: workout.exercises.iter().map(|e| e.name.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutRequest {
    pub workout_type: WorkoutType,
    /// Only used with `WorkoutType::Custom`.
    pub custom_muscle_groups: Vec<MuscleGroup>,
    pub duration_minutes: u32,
    pub equipment: Vec<Equipment>,
    pub experience_level: ExperienceLevel,
    pub goal: TrainingGoal,
    pub recent_workouts: Vec<RecentWorkout>,
}

impl WorkoutRequest {
    pub fn validate(&self) -> Result<(), InsightError> {
        if !ALLOWED_DURATIONS.contains(&self.duration_minutes) {
            return Err(InsightError::Validation(format!(
                "duration must be one of 30, 45, 60, 75 or 90 minutes (got {})",
                self.duration_minutes
            )));
        }
        if self.workout_type == WorkoutType::Custom && self.custom_muscle_groups.is_empty() {
            return Err(InsightError::Validation(
                "a custom workout needs at least one muscle group".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn target_muscles(&self) -> Vec<MuscleGroup> {
        if self.workout_type == WorkoutType::Custom {
            self.custom_muscle_groups.clone()
        } else {
            self.workout_type.target_muscles().to_vec()
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedExercise {
    pub exercise_id: String,
    pub name: String,
    pub sets: u32,
    #[serde(deserialize_with = "string_or_number")]
    pub reps: String,
    #[serde(default)]
    pub rest_seconds: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub intensity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedWorkout {
    pub name: String,
    #[serde(default)]
    pub estimated_duration: u32,
    #[serde(default)]
    pub target_muscle_groups: Vec<String>,
    #[serde(default)]
    pub warmup: Vec<GeneratedExercise>,
    #[serde(default)]
    pub main_workout: Vec<GeneratedExercise>,
    #[serde(default)]
    pub cooldown: Vec<GeneratedExercise>,
}

impl GeneratedWorkout {
    pub fn all_exercises(&self) -> impl Iterator<Item = &GeneratedExercise> {
        self.warmup
            .iter()
            .chain(self.main_workout.iter())
            .chain(self.cooldown.iter())
    }
}

/// Library exercises usable for the request: all required equipment present,
/// at least one target muscle, difficulty suited to the experience level.
pub fn available_exercises(request: &WorkoutRequest) -> Vec<&'static ExerciseDefinition> {
    let targets = request.target_muscles();
    exercises_for_equipment(&request.equipment)
        .into_iter()
        .filter(|ex| ex.muscle_groups.iter().any(|m| targets.contains(m)))
        .filter(|ex| ex.difficulty.suits(request.experience_level))
        .collect()
}

fn exercise_count_guidance(duration_minutes: u32) -> &'static str {
    match duration_minutes {
        0..=30 => "2 warmup, 4-5 main exercises",
        31..=45 => "2-3 warmup, 5-6 main exercises",
        46..=60 => "3 warmup, 6-7 main exercises",
        _ => "3 warmup, 7-8 main exercises",
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptExercise<'a> {
    id: &'a str,
    name: &'a str,
    category: ExerciseCategory,
    muscle_groups: &'a [MuscleGroup],
    is_compound: bool,
}

fn join_display<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn build_workout_prompt(
    request: &WorkoutRequest,
    exercises: &[&ExerciseDefinition],
) -> Result<String, InsightError> {
    let library: Vec<PromptExercise> = exercises
        .iter()
        .map(|ex| PromptExercise {
            id: &ex.id,
            name: &ex.name,
            category: ex.category,
            muscle_groups: &ex.muscle_groups,
            is_compound: ex.is_compound,
        })
        .collect();
    let library_json = serde_json::to_string_pretty(&library)?;

    let recent = if request.recent_workouts.is_empty() {
        "No recent workouts provided".to_string()
    } else {
        request
            .recent_workouts
            .iter()
            .map(|w| format!("- {}: {}", w.name, w.exercises.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let duration = request.duration_minutes;
    let goal = request.goal;
    Ok(format!(
        r#"You are an expert personal trainer creating a workout plan. Generate a structured workout based on the following:

USER PREFERENCES:
- Workout Type: {workout_type}
- Target Muscles: {targets}
- Duration: {duration} minutes
- Available Equipment: {equipment}
- Experience Level: {level}
- Goal: {goal}

PROGRAMMING GUIDANCE FOR {goal_upper}:
{guidance}

RECENT WORKOUTS (vary exercises from these):
{recent}

AVAILABLE EXERCISES (ONLY use exercises from this list):
{library_json}

REQUIREMENTS:
1. ONLY use exercises from the provided library - use the exact "id" and "name" values
2. For a {duration} minute workout: {counts}
3. Start with compound movements, finish with isolation
4. Include appropriate warmup exercises
5. Vary exercises from recent workouts when possible
6. Provide intensity as RPE (Rate of Perceived Exertion) 1-10 or % of 1RM

Generate a creative but appropriate workout name based on the type and goal.

Respond ONLY with valid JSON matching this exact structure:
{{
  "name": "string - creative workout name",
  "estimatedDuration": number,
  "targetMuscleGroups": ["array of muscle groups"],
  "warmup": [
    {{
      "exerciseId": "from library",
      "name": "from library",
      "sets": number,
      "reps": "string like '10-12' or '30 sec'",
      "restSeconds": number,
      "notes": "optional form cues",
      "intensity": "optional like 'RPE 5' or 'Light'"
    }}
  ],
  "mainWorkout": [same structure as warmup]
}}"#,
        workout_type = request.workout_type,
        targets = join_display(&request.target_muscles()),
        equipment = join_display(&request.equipment),
        level = request.experience_level,
        goal_upper = goal.to_string().to_uppercase(),
        guidance = goal.guidance(),
        counts = exercise_count_guidance(duration),
    ))
}

/// Finds the JSON value in chatty model output: the whole text if it
/// parses, otherwise the first balanced `open`..`close` block. Brackets
/// inside string literals are ignored.
pub fn extract_json(text: &str, open: char, close: char) -> Option<&str> {
    let trimmed = text.trim();
    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Some(trimmed);
    }

    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..start + offset + c.len_utf8()]);
            }
        }
    }
    None
}

fn parse_model_json<T: serde::de::DeserializeOwned>(
    raw: &str,
    open: char,
    close: char,
) -> Result<T, InsightError> {
    let Some(json) = extract_json(raw, open, close) else {
        error!("No JSON found in model response: {}", raw);
        return Err(InsightError::MalformedResponse("no JSON found in response".to_string()));
    };
    serde_json::from_str(json).map_err(|e| {
        error!("Failed to parse model JSON ({}): {}", e, raw);
        InsightError::MalformedResponse(e.to_string())
    })
}

/// Validates the request, asks the generator for a plan and parses it.
/// Exercise ids missing from the library are logged but kept.
pub fn generate_workout(
    generator: &dyn TextGenerator,
    request: &WorkoutRequest,
    max_tokens: u32,
) -> Result<GeneratedWorkout, InsightError> {
    request.validate()?;
    let exercises = available_exercises(request);
    if exercises.len() < MIN_AVAILABLE_EXERCISES {
        return Err(InsightError::NotEnoughExercises);
    }
    debug!("{} exercises available for generation", exercises.len());

    let prompt = build_workout_prompt(request, &exercises)?;
    let raw = generator.generate(&prompt, max_tokens)?;
    let workout: GeneratedWorkout = parse_model_json(&raw, '{', '}')?;

    for ex in workout.all_exercises() {
        if find_exercise(&ex.exercise_id).is_none() {
            warn!("Exercise not in library: {} ({})", ex.exercise_id, ex.name);
        }
    }
    info!(
        "Generated workout '{}' with {} main exercises",
        workout.name,
        workout.main_workout.len()
    );
    Ok(workout)
}

// ---- Insights ----

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InsightType {
    Recommendation,
    Analysis,
    Warning,
    Celebration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Deserialize)]
struct RawInsight {
    #[serde(rename = "type")]
    insight_type: InsightType,
    title: String,
    content: String,
}

#[derive(Default)]
struct ExerciseAggregate {
    sessions: u32,
    max_weight: f64,
    total_volume: f64,
}

const WEEK_ORDER: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Plain-text digest of the last 30 days of training for the insight prompt.
#[must_use]
pub fn prepare_workout_summary(workouts: &[SavedWorkout], now: DateTime<Utc>) -> String {
    let cutoff = now - Duration::days(SUMMARY_WINDOW_DAYS);
    let mut recent: Vec<&SavedWorkout> = workouts.iter().filter(|w| w.date >= cutoff).collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date));

    let total_workouts = recent.len();
    let total_volume: f64 = recent.iter().map(|w| w.volume).sum();
    let avg_duration_min = if total_workouts > 0 {
        let total_secs: u64 = recent.iter().map(|w| w.duration).sum();
        (total_secs as f64 / total_workouts as f64 / 60.0).round() as u64
    } else {
        0
    };

    // Insertion order keeps ties stable when sorting by volume.
    let mut order: Vec<String> = Vec::new();
    let mut per_exercise: HashMap<String, ExerciseAggregate> = HashMap::new();
    let mut per_day: HashMap<Weekday, u32> = HashMap::new();

    for workout in &recent {
        *per_day
            .entry(workout.date.with_timezone(&Local).weekday())
            .or_insert(0) += 1;
        for exercise in &workout.exercises {
            let agg = per_exercise.entry(exercise.name.clone()).or_insert_with(|| {
                order.push(exercise.name.clone());
                ExerciseAggregate::default()
            });
            agg.sessions += 1;
            for set in exercise.sets.iter().filter(|s| s.qualifies()) {
                agg.max_weight = agg.max_weight.max(set.weight.unwrap_or(0.0));
                agg.total_volume += set.volume();
            }
        }
    }

    let mut summary = format!(
        "WORKOUT SUMMARY (Last 30 Days):\n- Total workouts: {}\n- Total volume: {:.1}k kg\n- Average duration: {} minutes\n\nEXERCISE BREAKDOWN:",
        total_workouts,
        total_volume / 1000.0,
        avg_duration_min
    );

    let mut ranked: Vec<(&String, &ExerciseAggregate)> = order
        .iter()
        .filter_map(|name| per_exercise.get(name).map(|agg| (name, agg)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_volume.total_cmp(&a.1.total_volume));
    for (name, agg) in ranked.into_iter().take(10) {
        summary.push_str(&format!(
            "\n- {}: {} sessions, max weight {}kg, volume {:.1}k kg",
            name,
            agg.sessions,
            agg.max_weight,
            agg.total_volume / 1000.0
        ));
    }

    summary.push_str("\n\nWORKOUT FREQUENCY BY DAY:");
    for day in WEEK_ORDER {
        summary.push_str(&format!(
            "\n- {}: {} workouts",
            weekday_name(day),
            per_day.get(&day).copied().unwrap_or(0)
        ));
    }

    summary.push_str("\n\nRECENT WORKOUTS:");
    for workout in recent.iter().take(5) {
        let names: Vec<&str> = workout.exercises.iter().map(|e| e.name.as_str()).collect();
        summary.push_str(&format!(
            "\n- {}: {} ({}min) - {}",
            workout.date.with_timezone(&Local).format("%Y-%m-%d"),
            workout.name,
            (workout.duration as f64 / 60.0).round() as u64,
            names.join(", ")
        ));
    }
    summary
}

#[must_use]
pub fn build_insights_prompt(summary: &str) -> String {
    format!(
        r#"You are a knowledgeable fitness coach analyzing a user's workout history. Based on the following workout data, provide 3-5 personalized insights.

Each insight should be one of these types:
- "celebration": Celebrating achievements, PRs, or milestones
- "recommendation": Suggesting improvements or new approaches
- "analysis": Observing patterns or trends in the data
- "warning": Alerting about potential issues like overtraining or imbalances

Respond with a JSON array of insights. Each insight should have:
- type: one of the types above
- title: a short, engaging title (max 50 chars)
- content: detailed explanation (2-3 sentences)

Here is the workout data:

{summary}

Respond ONLY with a valid JSON array, no other text. Example format:
[
  {{
    "type": "celebration",
    "title": "Great consistency!",
    "content": "You've worked out 4 times this week. Consistency is key to progress."
  }}
]"#
    )
}

/// Asks the generator for insights on `workouts`. An empty history returns
/// no insights without calling the generator.
pub fn generate_insights(
    generator: &dyn TextGenerator,
    workouts: &[SavedWorkout],
    now: DateTime<Utc>,
    max_tokens: u32,
) -> Result<Vec<Insight>, InsightError> {
    if workouts.is_empty() {
        return Ok(Vec::new());
    }
    let prompt = build_insights_prompt(&prepare_workout_summary(workouts, now));
    let raw = generator.generate(&prompt, max_tokens)?;
    let parsed: Vec<RawInsight> = parse_model_json(&raw, '[', ']')?;

    let stamp = now.timestamp_millis();
    let insights: Vec<Insight> = parsed
        .into_iter()
        .enumerate()
        .map(|(index, raw)| Insight {
            id: format!("ai-{stamp}-{index}"),
            insight_type: raw.insight_type,
            title: raw.title,
            content: raw.content,
            created_at: now,
            is_read: false,
        })
        .collect();
    info!("Generated {} insights", insights.len());
    Ok(insights)
}
