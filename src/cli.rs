// src/cli.rs
use chrono::{Duration, Local, NaiveDate};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use gym_tracker_lib::goals::GoalType;
use gym_tracker_lib::insights::TrainingGoal;
use gym_tracker_lib::library::{
    Difficulty, Equipment, ExerciseCategory, MuscleGroup, WorkoutType,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Track workouts, records and goals from the terminal", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// Print list output as CSV instead of a table
    #[arg(long, global = true)]
    pub export_csv: bool,
}

// Custom parser for date strings and shorthands
pub fn parse_date_shorthand(s: &str) -> Result<NaiveDate, String> {
    let today = Local::now().date_naive();
    match s.to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => Ok(today - Duration::days(1)),
        _ => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(s, "%d.%m.%Y"))
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
            .map_err(|_| {
                format!(
                    "Invalid date format: '{s}'. Use 'today', 'yesterday', YYYY-MM-DD, DD.MM.YYYY, or YYYY/MM/DD."
                )
            }),
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitsCli {
    Metric,
    Imperial,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive workout session
    Workout {
        /// Name of the workout (defaults to "Workout")
        #[arg(short, long, conflicts_with = "template")]
        name: Option<String>,
        /// Start from a saved template (id)
        #[arg(short, long)]
        template: Option<String>,
    },
    /// List completed workouts, most recent first
    History {
        /// Show only the last N workouts
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
        /// Show workouts stored in the database for the signed-in user instead
        #[arg(long)]
        remote: bool,
    },
    /// Show the exercises and sets of one workout
    ShowWorkout {
        /// ID of the workout
        id: String,
    },
    /// Delete a workout from history
    DeleteWorkout {
        /// IDs of the workouts to delete
        ids: Vec<String>,
    },
    /// Rate a completed workout from 1 to 5
    RateWorkout {
        id: String,
        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
    },
    /// List personal records
    Prs {
        /// Only records set this calendar month
        #[arg(long)]
        month: bool,
        /// Only the record for one exercise (name as logged)
        #[arg(short = 'e', long, conflicts_with = "month")]
        exercise: Option<String>,
    },
    /// Show the current day streak
    Streak,
    /// Show totals across the workout history
    Stats,
    /// Show the plates needed per side for a target weight
    Plates {
        /// Target bar weight in your display units
        weight: f64,
        /// Override the configured bar weight (display units)
        #[arg(long)]
        bar: Option<f64>,
    },
    /// Estimate a one-rep max and training percentages
    OneRm {
        /// Weight lifted in your display units
        weight: f64,
        reps: i64,
    },
    /// Browse the exercise library
    Exercises {
        #[arg(short, long)]
        category: Option<ExerciseCategory>,
        /// Only exercises hitting this muscle group
        #[arg(short, long)]
        muscle: Option<MuscleGroup>,
        /// Only exercises doable with this equipment (comma-separated)
        #[arg(short = 'q', long, value_delimiter = ',')]
        equipment: Vec<Equipment>,
    },
    /// Manage workout templates
    #[command(subcommand)]
    Templates(TemplateCommands),
    /// Manage your own exercises
    #[command(subcommand)]
    CustomExercise(CustomExerciseCommands),
    /// Manage fitness goals
    #[command(subcommand)]
    Goal(GoalCommands),
    /// Log and list body measurements
    #[command(subcommand)]
    Measure(MeasureCommands),
    /// Show achievements and your progress towards them
    Achievements {
        /// Re-evaluate progress against the whole history first
        #[arg(long)]
        refresh: bool,
    },
    /// Sign in (the profile is created on first use)
    Login {
        username: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Sign out and revoke the saved token
    Logout,
    /// Show the signed-in profile
    Whoami,
    /// Edit the signed-in profile
    Profile(ProfileArgs),
    /// Set default units (Metric/Imperial)
    SetUnits {
        #[arg(value_enum)]
        units: UnitsCli,
    },
    /// Set the bar weight used by the plate calculator (kg)
    SetBarWeight { weight: f64 },
    /// Set the default rest timer length in seconds
    SetRest { seconds: u32 },
    /// Premium subscription management
    #[command(subcommand)]
    Subscription(SubscriptionCommands),
    /// AI workout generation and insights (premium)
    #[command(subcommand)]
    Ai(AiCommands),
    /// Show the path to the database file
    DbPath,
    /// Show the path to the config file
    ConfigPath,
    GenerateCompletion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// List templates
    List,
    /// Show the exercises in a template
    Show { id: String },
    /// Create a template from exercise specs like "Bench Press:4x8@60"
    Create {
        name: String,
        /// NAME:SETSxREPS[@WEIGHT] (weight in display units)
        #[arg(required = true)]
        exercises: Vec<String>,
    },
    /// Save a logged workout as a template
    FromWorkout {
        workout_id: String,
        #[arg(short, long)]
        name: String,
    },
    /// Rename a template
    Rename { id: String, name: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum CustomExerciseCommands {
    List,
    Add {
        name: String,
        #[arg(short, long, default_value = "strength")]
        category: ExerciseCategory,
        /// Comma-separated muscle groups
        #[arg(short, long, value_delimiter = ',')]
        muscles: Vec<MuscleGroup>,
        /// Comma-separated equipment
        #[arg(short = 'q', long, value_delimiter = ',')]
        equipment: Vec<Equipment>,
        #[arg(short, long, default_value = "beginner")]
        difficulty: Difficulty,
        #[arg(long)]
        compound: bool,
        #[arg(long)]
        description: Option<String>,
    },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum GoalCommands {
    List,
    Add {
        title: String,
        #[arg(short = 't', long = "type", default_value = "custom")]
        goal_type: GoalType,
        #[arg(long)]
        target: f64,
        #[arg(long)]
        current: Option<f64>,
        #[arg(short, long)]
        unit: String,
        /// Library exercise the goal tracks
        #[arg(short, long)]
        exercise: Option<String>,
        #[arg(long, value_parser = parse_date_shorthand)]
        deadline: Option<NaiveDate>,
        #[arg(long)]
        description: Option<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        target: Option<f64>,
        #[arg(short, long)]
        unit: Option<String>,
        #[arg(long, value_parser = parse_date_shorthand)]
        deadline: Option<NaiveDate>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Record progress; the goal completes once the target is reached
    Progress { id: String, value: f64 },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum MeasureCommands {
    List,
    /// Log a measurement (weights and lengths in display units)
    Add(MeasureArgs),
    /// Weight and circumference trends, oldest first
    Progress,
    Delete { id: String },
}

#[derive(Args, Debug)]
pub struct MeasureArgs {
    #[arg(short, long)]
    pub weight: Option<f64>,
    #[arg(long)]
    pub body_fat: Option<f64>,
    #[arg(long)]
    pub muscle_mass: Option<f64>,
    #[arg(long)]
    pub chest: Option<f64>,
    #[arg(long)]
    pub waist: Option<f64>,
    #[arg(long)]
    pub hips: Option<f64>,
    #[arg(long)]
    pub bicep: Option<f64>,
    #[arg(long)]
    pub thigh: Option<f64>,
    #[arg(short, long)]
    pub notes: Option<String>,
    #[arg(long, value_parser = parse_date_shorthand)]
    pub date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[arg(long)]
    pub display_name: Option<String>,
    #[arg(long)]
    pub bio: Option<String>,
    /// Height in display units
    #[arg(long)]
    pub height: Option<f64>,
    /// Body weight in display units
    #[arg(long)]
    pub weight: Option<f64>,
    #[arg(long)]
    pub experience: Option<Difficulty>,
}

#[derive(Subcommand, Debug)]
pub enum SubscriptionCommands {
    /// Show subscription status
    Status,
    /// Print a checkout link for the premium plan
    Upgrade,
    /// Print a link to the billing portal
    Portal,
    /// Show recorded subscription events
    Events,
    /// Apply a webhook delivery saved to disk
    Webhook {
        /// File containing the raw request body
        body: PathBuf,
        /// Value of the Stripe-Signature header
        #[arg(short, long)]
        signature: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AiCommands {
    /// Generate a workout plan
    Generate {
        #[arg(short = 't', long = "type", default_value = "full_body")]
        workout_type: WorkoutType,
        /// Muscle groups for a custom workout (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        muscles: Vec<MuscleGroup>,
        /// Minutes: 30, 45, 60, 75 or 90
        #[arg(short, long, default_value_t = 60)]
        duration: u32,
        /// Available equipment (comma-separated)
        #[arg(short = 'q', long, value_delimiter = ',', default_value = "barbell,dumbbell,bench,bodyweight")]
        equipment: Vec<Equipment>,
        #[arg(short = 'l', long, default_value = "intermediate")]
        level: Difficulty,
        #[arg(short, long, default_value = "general")]
        goal: TrainingGoal,
        /// Save the main exercises as a template with this name
        #[arg(long)]
        save_as: Option<String>,
    },
    /// Analyse recent training
    Insights,
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
