// src/library.rs
//! Built-in exercise catalogue and the enums used to describe exercises.
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExerciseCategory {
    Strength,
    Cardio,
    Flexibility,
    Sport,
    Warmup,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MuscleGroup {
    Chest,
    Back,
    Shoulders,
    Biceps,
    Triceps,
    Forearms,
    Abs,
    Obliques,
    Quads,
    Hamstrings,
    Glutes,
    Calves,
    Traps,
    Lats,
    LowerBack,
    HipFlexors,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Equipment {
    Barbell,
    Dumbbell,
    Kettlebell,
    Cable,
    Machine,
    Bodyweight,
    ResistanceBand,
    Bench,
    PullUpBar,
    DipBars,
    Treadmill,
    Bike,
    Rower,
    Elliptical,
    JumpRope,
    MedicineBall,
    FoamRoller,
    Mat,
}

/// Exercise difficulty, also used as the user's experience level.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

pub type ExperienceLevel = Difficulty;

impl Difficulty {
    /// Whether an exercise of this difficulty suits someone at `level`.
    /// Beginners only get beginner movements; intermediates get everything
    /// except advanced ones.
    #[must_use]
    pub fn suits(self, level: ExperienceLevel) -> bool {
        match level {
            Difficulty::Beginner => self == Difficulty::Beginner,
            Difficulty::Intermediate => self != Difficulty::Advanced,
            Difficulty::Advanced => true,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum WorkoutType {
    Push,
    Pull,
    Legs,
    Upper,
    Lower,
    FullBody,
    Custom,
}

impl WorkoutType {
    /// Muscles a split of this type trains. `Custom` has no fixed set.
    #[must_use]
    pub const fn target_muscles(self) -> &'static [MuscleGroup] {
        use MuscleGroup as M;
        match self {
            Self::Push => &[M::Chest, M::Shoulders, M::Triceps],
            Self::Pull => &[M::Back, M::Lats, M::Biceps, M::Traps],
            Self::Legs | Self::Lower => &[M::Quads, M::Hamstrings, M::Glutes, M::Calves],
            Self::Upper => &[
                M::Chest,
                M::Back,
                M::Shoulders,
                M::Biceps,
                M::Triceps,
                M::Lats,
                M::Traps,
            ],
            Self::FullBody => &[
                M::Chest,
                M::Back,
                M::Shoulders,
                M::Biceps,
                M::Triceps,
                M::Quads,
                M::Hamstrings,
                M::Glutes,
            ],
            Self::Custom => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    pub category: ExerciseCategory,
    pub muscle_groups: Vec<MuscleGroup>,
    pub equipment: Vec<Equipment>,
    pub is_compound: bool,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl ExerciseDefinition {
    #[must_use]
    pub fn is_cardio(&self) -> bool {
        self.category == ExerciseCategory::Cardio
    }

    /// A bare strength definition for an exercise known only by name
    /// (e.g. a template entry that is not in the catalogue).
    #[must_use]
    pub fn ad_hoc(name: &str) -> Self {
        Self {
            id: slugify(name),
            name: name.trim().to_string(),
            category: ExerciseCategory::Strength,
            muscle_groups: Vec::new(),
            equipment: Vec::new(),
            is_compound: false,
            difficulty: Difficulty::Beginner,
            instructions: None,
        }
    }
}

/// Lowercase, hyphen-separated identifier derived from a display name.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn entry(
    id: &str,
    name: &str,
    category: ExerciseCategory,
    muscles: &[MuscleGroup],
    equipment: &[Equipment],
    is_compound: bool,
    difficulty: Difficulty,
) -> ExerciseDefinition {
    ExerciseDefinition {
        id: id.to_string(),
        name: name.to_string(),
        category,
        muscle_groups: muscles.to_vec(),
        equipment: equipment.to_vec(),
        is_compound,
        difficulty,
        instructions: None,
    }
}

fn build_library() -> Vec<ExerciseDefinition> {
    use Difficulty::{Advanced, Beginner, Intermediate};
    use Equipment as E;
    use ExerciseCategory::{Cardio, Strength, Warmup};
    use MuscleGroup as M;

    vec![
        // Chest
        entry("bench-press", "Barbell Bench Press", Strength, &[M::Chest, M::Triceps, M::Shoulders], &[E::Barbell, E::Bench], true, Intermediate),
        entry("incline-bench-press", "Incline Barbell Bench Press", Strength, &[M::Chest, M::Triceps, M::Shoulders], &[E::Barbell, E::Bench], true, Intermediate),
        entry("dumbbell-bench-press", "Dumbbell Bench Press", Strength, &[M::Chest, M::Triceps, M::Shoulders], &[E::Dumbbell, E::Bench], true, Beginner),
        entry("incline-dumbbell-press", "Incline Dumbbell Press", Strength, &[M::Chest, M::Triceps, M::Shoulders], &[E::Dumbbell, E::Bench], true, Beginner),
        entry("dumbbell-fly", "Dumbbell Fly", Strength, &[M::Chest], &[E::Dumbbell, E::Bench], false, Beginner),
        entry("cable-crossover", "Cable Crossover", Strength, &[M::Chest], &[E::Cable], false, Beginner),
        entry("push-ups", "Push-Ups", Strength, &[M::Chest, M::Triceps, M::Shoulders], &[E::Bodyweight], true, Beginner),
        entry("dips", "Dips", Strength, &[M::Chest, M::Triceps, M::Shoulders], &[E::Bodyweight], true, Intermediate),
        entry("chest-press-machine", "Chest Press Machine", Strength, &[M::Chest, M::Triceps], &[E::Machine], true, Beginner),
        entry("pec-deck", "Pec Deck Machine", Strength, &[M::Chest], &[E::Machine], false, Beginner),
        // Back
        entry("deadlift", "Conventional Deadlift", Strength, &[M::Back, M::Hamstrings, M::Glutes, M::LowerBack], &[E::Barbell], true, Intermediate),
        entry("barbell-row", "Barbell Row", Strength, &[M::Back, M::Lats, M::Biceps], &[E::Barbell], true, Intermediate),
        entry("dumbbell-row", "Dumbbell Row", Strength, &[M::Back, M::Lats, M::Biceps], &[E::Dumbbell, E::Bench], true, Beginner),
        entry("pull-ups", "Pull-Ups", Strength, &[M::Lats, M::Back, M::Biceps], &[E::Bodyweight, E::PullUpBar], true, Intermediate),
        entry("chin-ups", "Chin-Ups", Strength, &[M::Lats, M::Back, M::Biceps], &[E::Bodyweight, E::PullUpBar], true, Intermediate),
        entry("lat-pulldown", "Lat Pulldown", Strength, &[M::Lats, M::Back, M::Biceps], &[E::Cable, E::Machine], true, Beginner),
        entry("seated-cable-row", "Seated Cable Row", Strength, &[M::Back, M::Lats, M::Biceps], &[E::Cable], true, Beginner),
        entry("t-bar-row", "T-Bar Row", Strength, &[M::Back, M::Lats, M::Biceps], &[E::Barbell], true, Intermediate),
        entry("face-pulls", "Face Pulls", Strength, &[M::Back, M::Shoulders, M::Traps], &[E::Cable], false, Beginner),
        // Shoulders
        entry("overhead-press", "Barbell Overhead Press", Strength, &[M::Shoulders, M::Triceps], &[E::Barbell], true, Intermediate),
        entry("dumbbell-shoulder-press", "Dumbbell Shoulder Press", Strength, &[M::Shoulders, M::Triceps], &[E::Dumbbell], true, Beginner),
        entry("arnold-press", "Arnold Press", Strength, &[M::Shoulders, M::Triceps], &[E::Dumbbell], true, Intermediate),
        entry("lateral-raises", "Lateral Raises", Strength, &[M::Shoulders], &[E::Dumbbell], false, Beginner),
        entry("front-raises", "Front Raises", Strength, &[M::Shoulders], &[E::Dumbbell], false, Beginner),
        entry("rear-delt-fly", "Rear Delt Fly", Strength, &[M::Shoulders, M::Back], &[E::Dumbbell], false, Beginner),
        entry("upright-rows", "Upright Rows", Strength, &[M::Shoulders, M::Traps], &[E::Barbell, E::Dumbbell], true, Intermediate),
        entry("shoulder-press-machine", "Shoulder Press Machine", Strength, &[M::Shoulders, M::Triceps], &[E::Machine], true, Beginner),
        // Arms
        entry("barbell-curl", "Barbell Curl", Strength, &[M::Biceps], &[E::Barbell], false, Beginner),
        entry("dumbbell-curl", "Dumbbell Curl", Strength, &[M::Biceps], &[E::Dumbbell], false, Beginner),
        entry("hammer-curl", "Hammer Curl", Strength, &[M::Biceps, M::Forearms], &[E::Dumbbell], false, Beginner),
        entry("preacher-curl", "Preacher Curl", Strength, &[M::Biceps], &[E::Barbell, E::Dumbbell, E::Bench], false, Beginner),
        entry("cable-curl", "Cable Curl", Strength, &[M::Biceps], &[E::Cable], false, Beginner),
        entry("incline-dumbbell-curl", "Incline Dumbbell Curl", Strength, &[M::Biceps], &[E::Dumbbell, E::Bench], false, Intermediate),
        entry("close-grip-bench", "Close-Grip Bench Press", Strength, &[M::Triceps, M::Chest], &[E::Barbell, E::Bench], true, Intermediate),
        entry("skull-crushers", "Skull Crushers", Strength, &[M::Triceps], &[E::Barbell, E::Bench], false, Intermediate),
        entry("tricep-pushdown", "Tricep Pushdown", Strength, &[M::Triceps], &[E::Cable], false, Beginner),
        entry("overhead-tricep-extension", "Overhead Tricep Extension", Strength, &[M::Triceps], &[E::Dumbbell, E::Cable], false, Beginner),
        entry("tricep-dips", "Tricep Dips", Strength, &[M::Triceps, M::Chest], &[E::Bodyweight], true, Beginner),
        entry("diamond-push-ups", "Diamond Push-Ups", Strength, &[M::Triceps, M::Chest], &[E::Bodyweight], true, Intermediate),
        // Legs
        entry("barbell-squat", "Barbell Back Squat", Strength, &[M::Quads, M::Glutes, M::Hamstrings], &[E::Barbell], true, Intermediate),
        entry("front-squat", "Front Squat", Strength, &[M::Quads, M::Glutes], &[E::Barbell], true, Advanced),
        entry("goblet-squat", "Goblet Squat", Strength, &[M::Quads, M::Glutes], &[E::Dumbbell, E::Kettlebell], true, Beginner),
        entry("leg-press", "Leg Press", Strength, &[M::Quads, M::Glutes, M::Hamstrings], &[E::Machine], true, Beginner),
        entry("leg-extension", "Leg Extension", Strength, &[M::Quads], &[E::Machine], false, Beginner),
        entry("lunges", "Lunges", Strength, &[M::Quads, M::Glutes, M::Hamstrings], &[E::Bodyweight, E::Dumbbell], true, Beginner),
        entry("bulgarian-split-squat", "Bulgarian Split Squat", Strength, &[M::Quads, M::Glutes], &[E::Bodyweight, E::Dumbbell, E::Bench], true, Intermediate),
        entry("hack-squat", "Hack Squat", Strength, &[M::Quads, M::Glutes], &[E::Machine], true, Intermediate),
        entry("romanian-deadlift", "Romanian Deadlift", Strength, &[M::Hamstrings, M::Glutes, M::LowerBack], &[E::Barbell, E::Dumbbell], true, Intermediate),
        entry("leg-curl", "Leg Curl", Strength, &[M::Hamstrings], &[E::Machine], false, Beginner),
        entry("hip-thrust", "Hip Thrust", Strength, &[M::Glutes, M::Hamstrings], &[E::Barbell, E::Bench], true, Intermediate),
        entry("glute-bridge", "Glute Bridge", Strength, &[M::Glutes, M::Hamstrings], &[E::Bodyweight], true, Beginner),
        entry("good-mornings", "Good Mornings", Strength, &[M::Hamstrings, M::LowerBack, M::Glutes], &[E::Barbell], true, Intermediate),
        entry("cable-pull-through", "Cable Pull-Through", Strength, &[M::Glutes, M::Hamstrings], &[E::Cable], true, Beginner),
        entry("standing-calf-raise", "Standing Calf Raise", Strength, &[M::Calves], &[E::Machine, E::Bodyweight], false, Beginner),
        entry("seated-calf-raise", "Seated Calf Raise", Strength, &[M::Calves], &[E::Machine], false, Beginner),
        // Core
        entry("plank", "Plank", Strength, &[M::Abs, M::Obliques], &[E::Bodyweight], true, Beginner),
        entry("crunches", "Crunches", Strength, &[M::Abs], &[E::Bodyweight], false, Beginner),
        entry("leg-raises", "Hanging Leg Raises", Strength, &[M::Abs, M::Obliques], &[E::Bodyweight, E::PullUpBar], false, Intermediate),
        entry("russian-twists", "Russian Twists", Strength, &[M::Obliques, M::Abs], &[E::Bodyweight, E::Dumbbell], false, Beginner),
        entry("cable-woodchop", "Cable Woodchop", Strength, &[M::Obliques, M::Abs], &[E::Cable], false, Intermediate),
        entry("ab-wheel-rollout", "Ab Wheel Rollout", Strength, &[M::Abs], &[E::Bodyweight], true, Intermediate),
        entry("dead-bug", "Dead Bug", Strength, &[M::Abs], &[E::Bodyweight], false, Beginner),
        entry("mountain-climbers", "Mountain Climbers", Strength, &[M::Abs, M::Obliques], &[E::Bodyweight], true, Beginner),
        // Warm-up
        entry("arm-circles", "Arm Circles", Warmup, &[M::Shoulders], &[E::Bodyweight], false, Beginner),
        entry("band-pull-aparts", "Band Pull-Aparts", Warmup, &[M::Back, M::Shoulders], &[E::ResistanceBand], false, Beginner),
        entry("leg-swings", "Leg Swings", Warmup, &[M::Hamstrings, M::Quads], &[E::Bodyweight], false, Beginner),
        entry("hip-circles", "Hip Circles", Warmup, &[M::Glutes, M::Hamstrings], &[E::Bodyweight], false, Beginner),
        entry("cat-cow", "Cat-Cow Stretch", Warmup, &[M::Back, M::Abs], &[E::Bodyweight], false, Beginner),
        entry("world-greatest-stretch", "World's Greatest Stretch", Warmup, &[M::Hamstrings, M::Quads, M::Back], &[E::Bodyweight], true, Beginner),
        entry("jumping-jacks", "Jumping Jacks", Warmup, &[M::Quads, M::Shoulders], &[E::Bodyweight], true, Beginner),
        entry("high-knees", "High Knees", Warmup, &[M::Quads, M::Abs], &[E::Bodyweight], true, Beginner),
        // Conditioning
        entry("running", "Running", Cardio, &[M::Quads, M::Hamstrings, M::Calves], &[E::Treadmill], true, Beginner),
        entry("rowing-machine", "Rowing Machine", Cardio, &[M::Back, M::Lats, M::Quads], &[E::Rower], true, Beginner),
        entry("stationary-bike", "Stationary Bike", Cardio, &[M::Quads, M::Calves], &[E::Bike], false, Beginner),
        entry("elliptical", "Elliptical Trainer", Cardio, &[M::Quads, M::Glutes], &[E::Elliptical], true, Beginner),
        entry("jump-rope", "Jump Rope", Cardio, &[M::Calves, M::Shoulders], &[E::JumpRope], true, Beginner),
    ]
}

/// The full built-in catalogue, built once on first use.
pub fn exercise_library() -> &'static [ExerciseDefinition] {
    static LIBRARY: OnceLock<Vec<ExerciseDefinition>> = OnceLock::new();
    LIBRARY.get_or_init(build_library)
}

pub fn find_exercise(id: &str) -> Option<&'static ExerciseDefinition> {
    exercise_library().iter().find(|e| e.id == id)
}

/// Case-insensitive lookup by display name.
pub fn find_exercise_by_name(name: &str) -> Option<&'static ExerciseDefinition> {
    let name = name.trim();
    exercise_library()
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
}

/// Exercises whose every piece of required equipment is available.
pub fn exercises_for_equipment(available: &[Equipment]) -> Vec<&'static ExerciseDefinition> {
    exercise_library()
        .iter()
        .filter(|e| e.equipment.iter().all(|eq| available.contains(eq)))
        .collect()
}

/// Exercises training at least one of `targets`.
pub fn exercises_for_muscle_groups(targets: &[MuscleGroup]) -> Vec<&'static ExerciseDefinition> {
    exercise_library()
        .iter()
        .filter(|e| e.muscle_groups.iter().any(|m| targets.contains(m)))
        .collect()
}

pub fn exercises_by_category(category: ExerciseCategory) -> Vec<&'static ExerciseDefinition> {
    exercise_library()
        .iter()
        .filter(|e| e.category == category)
        .collect()
}
