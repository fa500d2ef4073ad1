//src/main.rs
mod cli;
mod session_loop;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use std::io;
use std::io::stdout;
use tracing_subscriber::EnvFilter;

use gym_tracker_lib::achievements::{total_points, AchievementWithProgress};
use gym_tracker_lib::ai_client::AnthropicClient;
use gym_tracker_lib::auth::AuthError;
use gym_tracker_lib::billing::{StripeClient, SubscriptionEvent, SubscriptionInfo};
use gym_tracker_lib::custom_exercises::{CustomExercise, NewCustomExercise};
use gym_tracker_lib::fitness::{
    calculate_1rm, calculate_actual_weight, calculate_percentage_weight, PlateInfo,
    TRAINING_PERCENTAGES,
};
use gym_tracker_lib::goals::{partition_goals, GoalUpdate, NewGoal, UserGoal};
use gym_tracker_lib::history::SavedWorkout;
use gym_tracker_lib::insights::{Insight, WorkoutRequest};
use gym_tracker_lib::library::{
    exercise_library, exercises_by_category, exercises_for_equipment, exercises_for_muscle_groups,
    ExerciseDefinition,
};
use gym_tracker_lib::measurements::{
    circumference_history, latest_measurement, weight_history, BodyMeasurement, NewMeasurement,
};
use gym_tracker_lib::profile::{Profile, ProfileUpdate};
use gym_tracker_lib::records::{PersonalRecord, WorkoutStats};
use gym_tracker_lib::session::WorkoutSession;
use gym_tracker_lib::templates::{TemplateExercise, TemplateUpdate, WorkoutTemplate};
use gym_tracker_lib::time_format::{format_duration, format_relative_date};
use gym_tracker_lib::{AppService, DbError, Units};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    // --- Check for completion generation request FIRST ---
    let cli_args = cli::parse_args();
    let export_csv = cli_args.export_csv;

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command();
        let bin_name = cmd.get_name().to_string();

        eprintln!("Generating completion script for {}...", shell);
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    let mut service =
        AppService::initialize().context("Failed to initialize application service")?;

    match run(&mut service, cli_args.command, export_csv) {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<AuthError>() {
            Some(AuthError::Unauthorized(_)) => {
                bail!("{e}. Sign in first with 'gym-tracker login <username>'.")
            }
            Some(AuthError::UpgradeRequired) => {
                bail!("{e}. Run 'gym-tracker subscription upgrade' to get premium.")
            }
            _ => Err(e),
        },
    }
}

fn run(service: &mut AppService, command: cli::Commands, export_csv: bool) -> Result<()> {
    let header_color = gym_tracker_lib::parse_color(&service.config.theme.header_color)
        .map(Color::from)
        .unwrap_or(Color::Green); // Fallback
    let units = service.units();

    match command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }
        cli::Commands::Workout { name, template } => {
            let session = match template {
                Some(id) => service.start_workout_from_template(&id)?,
                None => service.start_workout(name.as_deref().unwrap_or("Workout")),
            };
            session_loop::run(service, &session, header_color)?;
        }
        cli::Commands::History { limit, remote } => {
            if remote {
                let sessions = service.remote_sessions(Some(limit as u32))?;
                if sessions.is_empty() {
                    println!("No workouts stored for this account.");
                } else if export_csv {
                    print_sessions_csv(&sessions)?;
                } else {
                    print_sessions_table(&sessions, header_color);
                }
                return Ok(());
            }
            let workouts: Vec<&SavedWorkout> = service.workouts().iter().take(limit).collect();
            if workouts.is_empty() {
                println!("No workouts logged yet. Start one with 'gym-tracker workout'.");
            } else if export_csv {
                print_history_csv(&workouts, units)?;
            } else {
                print_history_table(&workouts, header_color, units, service.now());
            }
        }
        cli::Commands::ShowWorkout { id } => match service.get_workout(&id) {
            Some(workout) => {
                if export_csv {
                    print_workout_sets_csv(workout, units)?;
                } else {
                    print_workout_detail(workout, header_color, units);
                }
            }
            None => bail!("Workout '{}' not found.", id),
        },
        cli::Commands::DeleteWorkout { ids } => {
            for id in ids {
                if service.delete_workout(&id)? {
                    println!("Deleted workout {id}");
                } else {
                    println!("Workout '{id}' not found.");
                }
            }
        }
        cli::Commands::RateWorkout { id, rating } => {
            if service.rate_workout(&id, rating)? {
                println!("Rated workout {id}: {}", "★".repeat(rating as usize));
            } else {
                bail!("Workout '{}' not found.", id);
            }
        }
        cli::Commands::Prs { month, exercise } => {
            let records = match exercise {
                Some(name) => service.exercise_pr(&name).into_iter().collect(),
                None if month => service.prs_this_month(),
                None => service.personal_records(),
            };
            if records.is_empty() {
                println!("No personal records yet.");
            } else if export_csv {
                print_prs_csv(&records, units)?;
            } else {
                print_prs_table(&records, header_color, units);
            }
        }
        cli::Commands::Streak => {
            let streak = service.day_streak();
            match streak {
                0 => println!("No active streak. Train today to start one!"),
                1 => println!("🔥 1 day streak"),
                n => println!("🔥 {n} day streak"),
            }
        }
        cli::Commands::Stats => {
            let stats = service.stats();
            if export_csv {
                print_stats_csv(&stats, units)?;
            } else {
                print_stats_table(&stats, header_color, units);
            }
        }
        cli::Commands::Plates { weight, bar } => {
            let target_kg = units.to_metric_weight(Some(weight)).unwrap_or(weight);
            let bar_kg = match bar {
                Some(b) => units.to_metric_weight(Some(b)).unwrap_or(b),
                None => service.config.bar_weight_kg,
            };
            let plates = if bar.is_some() {
                gym_tracker_lib::fitness::calculate_plates_needed(
                    target_kg,
                    bar_kg,
                    service.config.plate_set.plates(),
                )
            } else {
                service.plates(target_kg)
            };
            if plates.is_empty() {
                println!(
                    "Just the bar ({}).",
                    units.format_weight(Some(bar_kg))
                );
                return Ok(());
            }
            if export_csv {
                print_plates_csv(&plates, units)?;
            } else {
                print_plates_table(&plates, header_color, units);
                let actual = calculate_actual_weight(&plates, bar_kg);
                println!("Loaded weight: {}", units.format_weight(Some(actual)));
            }
        }
        cli::Commands::OneRm { weight, reps } => {
            let one_rm = calculate_1rm(weight, reps);
            if one_rm <= 0.0 {
                bail!("Weight and reps must both be positive.");
            }
            if export_csv {
                print_one_rm_csv(one_rm)?;
            } else {
                println!(
                    "Estimated 1RM: {one_rm} {}",
                    units.weight_unit()
                );
                print_one_rm_table(one_rm, header_color, units);
            }
        }
        cli::Commands::Exercises {
            category,
            muscle,
            equipment,
        } => {
            let mut exercises: Vec<ExerciseDefinition> = match (category, muscle, equipment.is_empty()) {
                (Some(c), _, _) => exercises_by_category(c),
                (None, Some(m), _) => exercises_for_muscle_groups(&[m]),
                (None, None, false) => exercises_for_equipment(&equipment),
                (None, None, true) => exercise_library().iter().collect(),
            }
            .into_iter()
            .cloned()
            .collect();
            if service.user.is_some() {
                exercises.extend(
                    service
                        .list_custom_exercises()?
                        .iter()
                        .map(CustomExercise::to_definition),
                );
            }
            // Custom exercises and the first narrowing above still need every filter.
            exercises.retain(|e| {
                category.map_or(true, |c| e.category == c)
                    && muscle.map_or(true, |m| e.muscle_groups.contains(&m))
                    && (equipment.is_empty() || e.equipment.iter().all(|eq| equipment.contains(eq)))
            });
            if exercises.is_empty() {
                println!("No exercises match the given filters.");
            } else if export_csv {
                print_exercises_csv(&exercises)?;
            } else {
                print_exercises_table(&exercises, header_color);
            }
        }
        cli::Commands::Templates(cmd) => run_templates(service, cmd, export_csv, header_color)?,
        cli::Commands::CustomExercise(cmd) => match cmd {
            cli::CustomExerciseCommands::List => {
                let exercises = service.list_custom_exercises()?;
                let definitions: Vec<ExerciseDefinition> =
                    exercises.iter().map(CustomExercise::to_definition).collect();
                if definitions.is_empty() {
                    println!("No custom exercises yet.");
                } else if export_csv {
                    print_exercises_csv(&definitions)?;
                } else {
                    print_exercises_table(&definitions, header_color);
                }
            }
            cli::CustomExerciseCommands::Add {
                name,
                category,
                muscles,
                equipment,
                difficulty,
                compound,
                description,
            } => {
                let created = service.add_custom_exercise(&NewCustomExercise {
                    name,
                    description,
                    category,
                    muscle_groups: muscles,
                    equipment,
                    difficulty,
                    is_compound: compound,
                })?;
                println!("Added custom exercise '{}' (ID: {})", created.name, created.id);
            }
            cli::CustomExerciseCommands::Delete { id } => {
                match service.delete_custom_exercise(&id) {
                    Ok(()) => println!("Deleted custom exercise {id}"),
                    Err(e) => match e.downcast_ref::<DbError>() {
                        Some(DbError::CustomExerciseNotFound(_)) => {
                            println!("Custom exercise '{id}' not found.")
                        }
                        _ => bail!("Error deleting custom exercise: {}", e),
                    },
                }
            }
        },
        cli::Commands::Goal(cmd) => run_goals(service, cmd, export_csv, header_color)?,
        cli::Commands::Measure(cmd) => match cmd {
            cli::MeasureCommands::List => {
                let measurements = service.list_measurements()?;
                if measurements.is_empty() {
                    println!("No measurements logged yet.");
                } else if export_csv {
                    print_measurements_csv(&measurements, units)?;
                } else {
                    print_measurements_table(&measurements, header_color, units);
                }
            }
            cli::MeasureCommands::Add(args) => {
                let input = NewMeasurement {
                    measured_at: args.date.and_then(local_noon),
                    weight_kg: units.to_metric_weight(args.weight),
                    body_fat_percent: args.body_fat,
                    muscle_mass_kg: units.to_metric_weight(args.muscle_mass),
                    chest_cm: units.to_metric_length(args.chest),
                    waist_cm: units.to_metric_length(args.waist),
                    hips_cm: units.to_metric_length(args.hips),
                    bicep_cm: units.to_metric_length(args.bicep),
                    thigh_cm: units.to_metric_length(args.thigh),
                    notes: args.notes,
                };
                let saved = service.add_measurement(&input)?;
                println!(
                    "Logged measurement for {} (ID: {})",
                    saved.measured_at.with_timezone(&Local).format("%Y-%m-%d"),
                    saved.id
                );
            }
            cli::MeasureCommands::Progress => {
                let measurements = service.list_measurements()?;
                match latest_measurement(&measurements) {
                    None => println!("No measurements logged yet."),
                    Some(_) if export_csv => print_measurement_trends_csv(&measurements, units)?,
                    Some(latest) => {
                        println!(
                            "Latest ({}): {}",
                            latest.measured_at.with_timezone(&Local).format("%Y-%m-%d"),
                            units.format_weight(latest.weight_kg)
                        );
                        print_measurement_trends_table(&measurements, header_color, units);
                    }
                }
            }
            cli::MeasureCommands::Delete { id } => {
                service.delete_measurement(&id)?;
                println!("Deleted measurement {id}");
            }
        },
        cli::Commands::Achievements { refresh } => {
            if refresh {
                for unlocked in service.refresh_achievements()? {
                    println!("{} Unlocked: {}", unlocked.icon, unlocked.name);
                }
            }
            let achievements = service.achievements()?;
            if export_csv {
                print_achievements_csv(&achievements)?;
            } else {
                print_achievements_table(&achievements, header_color);
                if service.user.is_some() {
                    println!("Total points: {}", total_points(&achievements));
                } else {
                    println!("Sign in to track achievement progress.");
                }
            }
        }
        cli::Commands::Login {
            username,
            display_name,
        } => {
            let profile = service.sign_in(&username, display_name.as_deref())?;
            println!("Signed in as {}.", profile.label());
        }
        cli::Commands::Logout => {
            if service.user.is_none() {
                println!("Not signed in.");
            } else {
                service.sign_out()?;
                println!("Signed out.");
            }
        }
        cli::Commands::Whoami => {
            let info = if service.user.is_some() {
                Some(service.subscription_info()?)
            } else {
                None
            };
            match (service.whoami(), info) {
                (Some(profile), Some(info)) => {
                    print_profile_table(profile, &info, header_color, units)
                }
                _ => println!("Not signed in."),
            }
        }
        cli::Commands::Profile(args) => {
            let update = ProfileUpdate {
                display_name: args.display_name,
                bio: args.bio,
                height_cm: units.to_metric_length(args.height),
                weight_kg: units.to_metric_weight(args.weight),
                experience_level: args.experience,
                ..ProfileUpdate::default()
            };
            let profile = service.update_profile(&update)?;
            println!("Updated profile for {}.", profile.label());
        }
        cli::Commands::SetUnits { units } => {
            let lib_units = match units {
                cli::UnitsCli::Metric => Units::Metric,
                cli::UnitsCli::Imperial => Units::Imperial,
            };
            service.set_units(lib_units)?;
            println!("Default units set to {lib_units:?}.");
        }
        cli::Commands::SetBarWeight { weight } => {
            service.set_bar_weight(weight)?;
            println!("Bar weight set to {weight} kg.");
        }
        cli::Commands::SetRest { seconds } => {
            service.set_default_rest_seconds(seconds)?;
            println!("Default rest set to {}.", format_duration(u64::from(seconds)));
        }
        cli::Commands::Subscription(cmd) => run_subscription(service, cmd, header_color)?,
        cli::Commands::Ai(cmd) => run_ai(service, cmd, export_csv, header_color)?,
        cli::Commands::DbPath => {
            println!("Database file is located at: {:?}", service.get_db_path());
        }
        cli::Commands::ConfigPath => {
            println!("Config file is located at: {:?}", service.get_config_path());
        }
    }
    Ok(())
}

fn local_noon(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(12, 0, 0)
        .and_then(|dt| dt.and_local_timezone(Local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

fn run_templates(
    service: &mut AppService,
    cmd: cli::TemplateCommands,
    export_csv: bool,
    header_color: Color,
) -> Result<()> {
    let units = service.units();
    match cmd {
        cli::TemplateCommands::List => {
            let templates = service.list_templates();
            if export_csv {
                print_templates_csv(templates)?;
            } else {
                print_templates_table(templates, header_color, service.now());
            }
        }
        cli::TemplateCommands::Show { id } => {
            let template = service
                .list_templates()
                .iter()
                .find(|t| t.id == id)
                .with_context(|| format!("Template '{id}' not found"))?;
            println!("{} ({})", template.name, template.id);
            print_template_exercises_table(template, header_color, units);
        }
        cli::TemplateCommands::Create { name, exercises } => {
            let parsed = exercises
                .iter()
                .map(|spec| parse_template_exercise(spec, units))
                .collect::<Result<Vec<_>>>()?;
            let template = service.create_template(&name, parsed)?;
            println!("Created template '{}' (ID: {})", template.name, template.id);
        }
        cli::TemplateCommands::FromWorkout { workout_id, name } => {
            let template = service.template_from_workout(&workout_id, &name)?;
            println!(
                "Saved workout as template '{}' (ID: {})",
                template.name, template.id
            );
        }
        cli::TemplateCommands::Rename { id, name } => {
            let update = TemplateUpdate {
                name: Some(name.trim().to_string()),
                ..TemplateUpdate::default()
            };
            if !service.update_template(&id, update)? {
                bail!("Template '{}' not found.", id);
            }
            println!("Renamed template {id}");
        }
        cli::TemplateCommands::Delete { id } => {
            if !service.delete_template(&id)? {
                bail!("Template '{}' not found.", id);
            }
            println!("Deleted template {id}");
        }
    }
    Ok(())
}

/// Parses `NAME:SETSxREPS[@WEIGHT]`, e.g. `Bench Press:4x8@60`.
fn parse_template_exercise(spec: &str, units: Units) -> Result<TemplateExercise> {
    let (name, scheme) = spec
        .rsplit_once(':')
        .with_context(|| format!("Invalid exercise '{spec}'. Use NAME:SETSxREPS[@WEIGHT]."))?;
    let (volume, weight) = match scheme.split_once('@') {
        Some((volume, weight)) => {
            let weight: f64 = weight
                .trim()
                .parse()
                .with_context(|| format!("Invalid weight in '{spec}'"))?;
            (volume, Some(weight))
        }
        None => (scheme, None),
    };
    let (sets, reps) = volume
        .split_once(['x', 'X'])
        .with_context(|| format!("Invalid sets/reps in '{spec}'. Use e.g. 4x8."))?;
    let sets: u32 = sets
        .trim()
        .parse()
        .with_context(|| format!("Invalid set count in '{spec}'"))?;
    let reps: i64 = reps
        .trim()
        .parse()
        .with_context(|| format!("Invalid rep count in '{spec}'"))?;
    if name.trim().is_empty() || sets == 0 {
        bail!("Invalid exercise '{}'. Name and at least one set are required.", spec);
    }
    Ok(TemplateExercise {
        name: name.trim().to_string(),
        sets,
        default_weight: units.to_metric_weight(weight),
        default_reps: Some(reps),
    })
}

fn run_goals(
    service: &mut AppService,
    cmd: cli::GoalCommands,
    export_csv: bool,
    header_color: Color,
) -> Result<()> {
    match cmd {
        cli::GoalCommands::List => {
            let goals = service.list_goals()?;
            if goals.is_empty() {
                println!("No goals yet. Add one with 'gym-tracker goal add'.");
            } else if export_csv {
                print_goals_csv(&goals)?;
            } else {
                let (active, completed) = partition_goals(goals);
                if !active.is_empty() {
                    println!("Active goals");
                    print_goals_table(&active, header_color);
                }
                if !completed.is_empty() {
                    println!("Completed goals");
                    print_goals_table(&completed, header_color);
                }
            }
        }
        cli::GoalCommands::Add {
            title,
            goal_type,
            target,
            current,
            unit,
            exercise,
            deadline,
            description,
        } => {
            let exercise_id = match exercise {
                Some(identifier) => Some(service.resolve_exercise(&identifier)?.id),
                None => None,
            };
            let goal = service.create_goal(&NewGoal {
                goal_type,
                title,
                description,
                target_value: target,
                current_value: current,
                unit,
                exercise_id,
                deadline,
            })?;
            println!("Created goal '{}' (ID: {})", goal.title, goal.id);
        }
        cli::GoalCommands::Edit {
            id,
            title,
            target,
            unit,
            deadline,
            description,
        } => {
            let goal = service.update_goal(
                &id,
                &GoalUpdate {
                    title,
                    description,
                    target_value: target,
                    unit,
                    deadline,
                },
            )?;
            println!("Updated goal '{}'", goal.title);
        }
        cli::GoalCommands::Progress { id, value } => {
            let goal = service.update_goal_progress(&id, value)?;
            if goal.is_completed {
                println!("🎯 Goal '{}' completed!", goal.title);
            } else {
                println!(
                    "Goal '{}': {}% ({} / {} {})",
                    goal.title,
                    goal.progress_percentage(),
                    goal.current_value,
                    goal.target_value,
                    goal.unit
                );
            }
        }
        cli::GoalCommands::Delete { id } => {
            service.delete_goal(&id)?;
            println!("Deleted goal {id}");
        }
    }
    Ok(())
}

fn run_subscription(
    service: &mut AppService,
    cmd: cli::SubscriptionCommands,
    header_color: Color,
) -> Result<()> {
    match cmd {
        cli::SubscriptionCommands::Status => {
            let info = service.subscription_info()?;
            print_subscription(&info);
        }
        cli::SubscriptionCommands::Upgrade => {
            let gateway = StripeClient::from_config(&service.config.billing)?;
            let url = service.create_checkout(&gateway)?;
            println!("Complete your upgrade at:\n{url}");
        }
        cli::SubscriptionCommands::Portal => {
            let gateway = StripeClient::from_config(&service.config.billing)?;
            let url = service.create_portal(&gateway)?;
            println!("Manage your subscription at:\n{url}");
        }
        cli::SubscriptionCommands::Events => {
            let events = service.subscription_events()?;
            if events.is_empty() {
                println!("No subscription events recorded.");
            } else {
                print_subscription_events_table(&events, header_color);
            }
        }
        cli::SubscriptionCommands::Webhook { body, signature } => {
            let payload = std::fs::read_to_string(&body)
                .with_context(|| format!("Failed to read webhook body from {body:?}"))?;
            let gateway = StripeClient::from_config(&service.config.billing)?;
            match service.handle_webhook(&gateway, signature.as_deref(), &payload)? {
                Some(applied) => println!(
                    "Applied {} for user {} (status: {})",
                    applied.event_type, applied.user_id, applied.status
                ),
                None => println!("Event acknowledged; nothing to apply."),
            }
        }
    }
    Ok(())
}

fn run_ai(
    service: &mut AppService,
    cmd: cli::AiCommands,
    export_csv: bool,
    header_color: Color,
) -> Result<()> {
    let generator = AnthropicClient::from_config(&service.config.ai)?;
    match cmd {
        cli::AiCommands::Generate {
            workout_type,
            muscles,
            duration,
            equipment,
            level,
            goal,
            save_as,
        } => {
            let request = WorkoutRequest {
                workout_type,
                custom_muscle_groups: muscles,
                duration_minutes: duration,
                equipment,
                experience_level: level,
                goal,
                recent_workouts: Vec::new(),
            };
            let workout = service.generate_workout(&generator, request)?;
            println!(
                "{} (~{} min, {})",
                workout.name,
                workout.estimated_duration,
                workout.target_muscle_groups.join(", ")
            );
            print_generated_section("Warm-up", &workout.warmup, header_color);
            print_generated_section("Main workout", &workout.main_workout, header_color);
            print_generated_section("Cool-down", &workout.cooldown, header_color);

            if let Some(name) = save_as {
                let exercises = workout
                    .main_workout
                    .iter()
                    .map(|ex| TemplateExercise {
                        name: ex.name.clone(),
                        sets: ex.sets.max(1),
                        default_weight: None,
                        default_reps: ex.reps.trim().parse().ok(),
                    })
                    .collect();
                let template = service.create_template(&name, exercises)?;
                println!("Saved as template '{}' (ID: {})", template.name, template.id);
            }
        }
        cli::AiCommands::Insights => {
            let insights = service.generate_insights(&generator)?;
            if insights.is_empty() {
                println!("Log a few workouts first to get insights.");
            } else if export_csv {
                print_insights_csv(&insights)?;
            } else {
                for insight in &insights {
                    print_insight(insight);
                }
            }
        }
    }
    Ok(())
}

// --- Table Printing Functions ---

fn new_table(headers: &[&str], header_color: Color) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(header_color))
                .collect::<Vec<_>>(),
        );
    table
}

fn opt_cell<T: ToString>(value: Option<T>) -> Cell {
    Cell::new(value.map_or_else(|| "-".to_string(), |v| v.to_string()))
}

fn local_date(date: DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn print_history_table(
    workouts: &[&SavedWorkout],
    header_color: Color,
    units: Units,
    now: DateTime<Utc>,
) {
    let mut table = new_table(
        &["ID", "When", "Name", "Duration", "Exercises", "Sets", "Volume", "Rating"],
        header_color,
    );
    for workout in workouts {
        table.add_row(vec![
            Cell::new(&workout.id),
            Cell::new(format_relative_date(workout.date, now)),
            Cell::new(&workout.name),
            Cell::new(format_duration(workout.duration)),
            Cell::new(workout.exercises.len()),
            Cell::new(workout.completed_sets()),
            Cell::new(units.format_volume(workout.volume)),
            opt_cell(workout.rating.map(|r| "★".repeat(r as usize))),
        ]);
    }
    println!("{table}");
}

fn print_history_csv(workouts: &[&SavedWorkout], units: Units) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "ID",
        "Date_Local",
        "Name",
        "Duration_Sec",
        "Exercises",
        "Sets",
        &format!("Volume_{}", units.weight_unit()),
        "Rating",
        "Notes",
    ])?;
    for workout in workouts {
        writer.write_record([
            workout.id.clone(),
            workout.date.with_timezone(&Local).to_rfc3339(),
            workout.name.clone(),
            workout.duration.to_string(),
            workout.exercises.len().to_string(),
            workout.completed_sets().to_string(),
            format!("{:.2}", units.convert_weight(Some(workout.volume)).unwrap_or(0.0)),
            workout.rating.map(|r| r.to_string()).unwrap_or_default(),
            workout.notes.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_workout_detail(workout: &SavedWorkout, header_color: Color, units: Units) {
    println!(
        "{} · {} · {} · {}",
        workout.name,
        local_date(workout.date),
        format_duration(workout.duration),
        units.format_volume(workout.volume)
    );
    if let Some(notes) = &workout.notes {
        println!("Notes: {notes}");
    }
    let mut table = new_table(
        &["Exercise", "Set", &format!("Weight ({})", units.weight_unit()), "Reps", "Done"],
        header_color,
    );
    for exercise in &workout.exercises {
        for (i, set) in exercise.sets.iter().enumerate() {
            let name = if i == 0 { exercise.name.as_str() } else { "" };
            table.add_row(vec![
                Cell::new(name).add_attribute(Attribute::Bold),
                Cell::new(i + 1),
                opt_cell(units.convert_weight(set.weight)),
                opt_cell(set.reps),
                Cell::new(if set.completed { "✓" } else { "" }),
            ]);
        }
    }
    println!("{table}");
}

fn print_workout_sets_csv(workout: &SavedWorkout, units: Units) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "Exercise",
        "Set",
        &format!("Weight_{}", units.weight_unit()),
        "Reps",
        "Completed",
    ])?;
    for exercise in &workout.exercises {
        for (i, set) in exercise.sets.iter().enumerate() {
            writer.write_record([
                exercise.name.clone(),
                (i + 1).to_string(),
                units
                    .convert_weight(set.weight)
                    .map(|w| w.to_string())
                    .unwrap_or_default(),
                set.reps.map(|r| r.to_string()).unwrap_or_default(),
                set.completed.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn print_sessions_table(sessions: &[WorkoutSession], header_color: Color) {
    let mut table = new_table(
        &["ID", "Name", "Status", "Started (Local)", "Duration", "Rating"],
        header_color,
    );
    for session in sessions {
        table.add_row(vec![
            Cell::new(&session.id),
            Cell::new(&session.name),
            Cell::new(session.status),
            Cell::new(local_date(session.started_at)),
            opt_cell(session.duration_sec.map(format_duration)),
            opt_cell(session.rating),
        ]);
    }
    println!("{table}");
}

fn print_sessions_csv(sessions: &[WorkoutSession]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["ID", "Name", "Status", "Started", "Completed", "Duration_Sec", "Rating"])?;
    for session in sessions {
        writer.write_record([
            session.id.clone(),
            session.name.clone(),
            session.status.to_string(),
            session.started_at.to_rfc3339(),
            session.completed_at.map(|d| d.to_rfc3339()).unwrap_or_default(),
            session.duration_sec.map(|d| d.to_string()).unwrap_or_default(),
            session.rating.map(|r| r.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_prs_table(records: &[PersonalRecord], header_color: Color, units: Units) {
    let unit = units.weight_unit();
    let mut table = new_table(
        &[
            "Exercise",
            &format!("Weight ({unit})"),
            "Reps",
            &format!("Est. 1RM ({unit})"),
            "Date",
        ],
        header_color,
    );
    for pr in records {
        table.add_row(vec![
            Cell::new(&pr.exercise_name).add_attribute(Attribute::Bold),
            opt_cell(units.convert_weight(Some(pr.weight))),
            Cell::new(pr.reps),
            opt_cell(units.convert_weight(Some(pr.estimated_1rm))),
            Cell::new(pr.date.with_timezone(&Local).format("%Y-%m-%d").to_string()),
        ]);
    }
    println!("{table}");
}

fn print_prs_csv(records: &[PersonalRecord], units: Units) -> Result<()> {
    let unit = units.weight_unit();
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "Exercise",
        &format!("Weight_{unit}"),
        "Reps",
        &format!("Estimated_1RM_{unit}"),
        "Date",
        "Workout_ID",
    ])?;
    for pr in records {
        writer.write_record([
            pr.exercise_name.clone(),
            units.convert_weight(Some(pr.weight)).unwrap_or(0.0).to_string(),
            pr.reps.to_string(),
            units.convert_weight(Some(pr.estimated_1rm)).unwrap_or(0.0).to_string(),
            pr.date.to_rfc3339(),
            pr.workout_id.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_stats_table(stats: &WorkoutStats, header_color: Color, units: Units) {
    let mut table = new_table(&["Stat", "Value"], header_color);
    let rows = [
        ("Total workouts", stats.total_workouts.to_string()),
        ("Total volume", units.format_volume(stats.total_volume)),
        ("Total time", format_duration(stats.total_duration_sec)),
        ("Completed sets", stats.total_sets.to_string()),
        ("Current streak (days)", stats.current_streak.to_string()),
        ("Longest streak (days)", stats.longest_streak.to_string()),
        ("Workouts this week", stats.workouts_this_week.to_string()),
        ("Workouts this month", stats.workouts_this_month.to_string()),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    println!("{table}");
}

fn print_stats_csv(stats: &WorkoutStats, units: Units) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "Total_Workouts",
        &format!("Total_Volume_{}", units.weight_unit()),
        "Total_Duration_Sec",
        "Total_Sets",
        "Current_Streak",
        "Longest_Streak",
        "Workouts_This_Week",
        "Workouts_This_Month",
    ])?;
    writer.write_record([
        stats.total_workouts.to_string(),
        format!("{:.2}", units.convert_weight(Some(stats.total_volume)).unwrap_or(0.0)),
        stats.total_duration_sec.to_string(),
        stats.total_sets.to_string(),
        stats.current_streak.to_string(),
        stats.longest_streak.to_string(),
        stats.workouts_this_week.to_string(),
        stats.workouts_this_month.to_string(),
    ])?;
    writer.flush()?;
    Ok(())
}

fn print_plates_table(plates: &[PlateInfo], header_color: Color, units: Units) {
    let mut table = new_table(
        &[format!("Plate ({})", units.weight_unit()).as_str(), "Per side"],
        header_color,
    );
    for plate in plates {
        table.add_row(vec![
            Cell::new(units.convert_weight(Some(plate.weight)).unwrap_or(plate.weight))
                .fg(Color::from(plate.color)),
            Cell::new(format!("× {}", plate.count)),
        ]);
    }
    println!("{table}");
}

fn print_plates_csv(plates: &[PlateInfo], units: Units) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([format!("Plate_{}", units.weight_unit()), "Per_Side".to_string()])?;
    for plate in plates {
        writer.write_record([
            units.convert_weight(Some(plate.weight)).unwrap_or(plate.weight).to_string(),
            plate.count.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_one_rm_table(one_rm: f64, header_color: Color, units: Units) {
    let mut table = new_table(
        &["%", &format!("Weight ({})", units.weight_unit()), "Typical reps"],
        header_color,
    );
    for tp in TRAINING_PERCENTAGES {
        table.add_row(vec![
            Cell::new(format!("{}%", tp.percent)),
            Cell::new(calculate_percentage_weight(one_rm, f64::from(tp.percent))),
            Cell::new(tp.description),
        ]);
    }
    println!("{table}");
}

fn print_one_rm_csv(one_rm: f64) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["Percent", "Weight", "Description"])?;
    for tp in TRAINING_PERCENTAGES {
        writer.write_record([
            tp.percent.to_string(),
            calculate_percentage_weight(one_rm, f64::from(tp.percent)).to_string(),
            tp.description.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_exercises_table(exercises: &[ExerciseDefinition], header_color: Color) {
    let mut table = new_table(
        &["ID", "Name", "Category", "Muscles", "Equipment", "Difficulty"],
        header_color,
    );
    for ex in exercises {
        table.add_row(vec![
            Cell::new(&ex.id),
            Cell::new(&ex.name).add_attribute(Attribute::Bold),
            Cell::new(ex.category),
            Cell::new(join(&ex.muscle_groups)),
            Cell::new(join(&ex.equipment)),
            Cell::new(ex.difficulty),
        ]);
    }
    println!("{table}");
}

fn print_exercises_csv(exercises: &[ExerciseDefinition]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["ID", "Name", "Category", "Muscles", "Equipment", "Difficulty", "Compound"])?;
    for ex in exercises {
        writer.write_record([
            ex.id.clone(),
            ex.name.clone(),
            ex.category.to_string(),
            join(&ex.muscle_groups),
            join(&ex.equipment),
            ex.difficulty.to_string(),
            ex.is_compound.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_templates_table(templates: &[WorkoutTemplate], header_color: Color, now: DateTime<Utc>) {
    let mut table = new_table(&["ID", "Name", "Exercises", "Sets", "Last used"], header_color);
    for template in templates {
        let sets: u32 = template.exercises.iter().map(|e| e.sets).sum();
        table.add_row(vec![
            Cell::new(&template.id),
            Cell::new(&template.name).add_attribute(Attribute::Bold),
            Cell::new(template.exercises.len()),
            Cell::new(sets),
            opt_cell(template.last_used.map(|d| format_relative_date(d, now))),
        ]);
    }
    println!("{table}");
}

fn print_templates_csv(templates: &[WorkoutTemplate]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["ID", "Name", "Exercise", "Sets", "Default_Reps", "Default_Weight_kg"])?;
    for template in templates {
        for ex in &template.exercises {
            writer.write_record([
                template.id.clone(),
                template.name.clone(),
                ex.name.clone(),
                ex.sets.to_string(),
                ex.default_reps.map(|r| r.to_string()).unwrap_or_default(),
                ex.default_weight.map(|w| w.to_string()).unwrap_or_default(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn print_template_exercises_table(template: &WorkoutTemplate, header_color: Color, units: Units) {
    let mut table = new_table(
        &["Exercise", "Sets", "Reps", &format!("Weight ({})", units.weight_unit())],
        header_color,
    );
    for ex in &template.exercises {
        table.add_row(vec![
            Cell::new(&ex.name),
            Cell::new(ex.sets),
            opt_cell(ex.default_reps),
            opt_cell(units.convert_weight(ex.default_weight)),
        ]);
    }
    println!("{table}");
}

fn print_goals_table(goals: &[UserGoal], header_color: Color) {
    let mut table = new_table(
        &["ID", "Title", "Type", "Progress", "Current", "Target", "Deadline"],
        header_color,
    );
    for goal in goals {
        let pct = goal.progress_percentage();
        let progress_color = match pct {
            100 => Color::Green,
            50..=99 => Color::Yellow,
            _ => Color::Reset,
        };
        table.add_row(vec![
            Cell::new(&goal.id),
            Cell::new(&goal.title).add_attribute(Attribute::Bold),
            Cell::new(goal.goal_type),
            Cell::new(format!("{pct}%")).fg(progress_color),
            Cell::new(format!("{} {}", goal.current_value, goal.unit)),
            Cell::new(format!("{} {}", goal.target_value, goal.unit)),
            opt_cell(goal.deadline),
        ]);
    }
    println!("{table}");
}

fn print_goals_csv(goals: &[UserGoal]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "ID", "Title", "Type", "Current", "Target", "Unit", "Progress_Pct", "Deadline", "Completed",
    ])?;
    for goal in goals {
        writer.write_record([
            goal.id.clone(),
            goal.title.clone(),
            goal.goal_type.to_string(),
            goal.current_value.to_string(),
            goal.target_value.to_string(),
            goal.unit.clone(),
            goal.progress_percentage().to_string(),
            goal.deadline.map(|d| d.to_string()).unwrap_or_default(),
            goal.is_completed.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_measurements_table(measurements: &[BodyMeasurement], header_color: Color, units: Units) {
    let mut table = new_table(
        &["ID", "Date", "Weight", "Body fat", "Chest", "Waist", "Hips", "Arms", "Thighs"],
        header_color,
    );
    for m in measurements {
        table.add_row(vec![
            Cell::new(&m.id),
            Cell::new(m.measured_at.with_timezone(&Local).format("%Y-%m-%d").to_string()),
            Cell::new(units.format_weight(m.weight_kg)),
            opt_cell(m.body_fat_percent.map(|bf| format!("{bf}%"))),
            Cell::new(units.format_length(m.chest_cm)),
            Cell::new(units.format_length(m.waist_cm)),
            Cell::new(units.format_length(m.hips_cm)),
            Cell::new(units.format_length(m.bicep_cm)),
            Cell::new(units.format_length(m.thigh_cm)),
        ]);
    }
    println!("{table}");
}

fn print_measurements_csv(measurements: &[BodyMeasurement], units: Units) -> Result<()> {
    let w = units.weight_unit();
    let l = units.length_unit();
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "ID".to_string(),
        "Measured_At".to_string(),
        format!("Weight_{w}"),
        "Body_Fat_Pct".to_string(),
        format!("Muscle_Mass_{w}"),
        format!("Chest_{l}"),
        format!("Waist_{l}"),
        format!("Hips_{l}"),
        format!("Bicep_{l}"),
        format!("Thigh_{l}"),
        "Notes".to_string(),
    ])?;
    let num = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    for m in measurements {
        writer.write_record([
            m.id.clone(),
            m.measured_at.to_rfc3339(),
            num(units.convert_weight(m.weight_kg)),
            num(m.body_fat_percent),
            num(units.convert_weight(m.muscle_mass_kg)),
            num(units.convert_length(m.chest_cm)),
            num(units.convert_length(m.waist_cm)),
            num(units.convert_length(m.hips_cm)),
            num(units.convert_length(m.bicep_cm)),
            num(units.convert_length(m.thigh_cm)),
            m.notes.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_measurement_trends_table(measurements: &[BodyMeasurement], header_color: Color, units: Units) {
    let weights = weight_history(measurements);
    if !weights.is_empty() {
        println!("Weight");
        let mut table = new_table(&["Date", "Weight", "Body fat"], header_color);
        for point in &weights {
            table.add_row(vec![
                Cell::new(point.date.with_timezone(&Local).format("%Y-%m-%d").to_string()),
                Cell::new(units.format_weight(Some(point.weight))),
                opt_cell((point.body_fat > 0.0).then(|| format!("{}%", point.body_fat))),
            ]);
        }
        println!("{table}");
    }

    println!("Circumferences ({})", units.length_unit());
    let mut table = new_table(&["Date", "Chest", "Waist", "Hips", "Arms", "Thighs"], header_color);
    for point in circumference_history(measurements) {
        let mut row = vec![Cell::new(
            point.date.with_timezone(&Local).format("%Y-%m-%d").to_string(),
        )];
        for cm in [point.chest, point.waist, point.hips, point.arms, point.thighs] {
            row.push(Cell::new(units.format_length(Some(cm))));
        }
        table.add_row(row);
    }
    println!("{table}");
}

fn print_measurement_trends_csv(measurements: &[BodyMeasurement], units: Units) -> Result<()> {
    let weights = weight_history(measurements);
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "Date".to_string(),
        format!("Weight_{}", units.weight_unit()),
        "Body_Fat_Pct".to_string(),
        format!("Chest_{}", units.length_unit()),
        format!("Waist_{}", units.length_unit()),
        format!("Hips_{}", units.length_unit()),
        format!("Arms_{}", units.length_unit()),
        format!("Thighs_{}", units.length_unit()),
    ])?;
    let num = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    for point in circumference_history(measurements) {
        let weight = weights.iter().find(|w| w.date == point.date);
        writer.write_record([
            point.date.to_rfc3339(),
            num(units.convert_weight(weight.map(|w| w.weight))),
            num(weight.map(|w| w.body_fat)),
            num(units.convert_length(Some(point.chest))),
            num(units.convert_length(Some(point.waist))),
            num(units.convert_length(Some(point.hips))),
            num(units.convert_length(Some(point.arms))),
            num(units.convert_length(Some(point.thighs))),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_achievements_table(achievements: &[AchievementWithProgress], header_color: Color) {
    let mut table = new_table(
        &["", "Name", "Description", "Points", "Progress", "Unlocked"],
        header_color,
    );
    for a in achievements {
        let progress = Cell::new(format!("{:.0}%", a.progress));
        table.add_row(vec![
            Cell::new(&a.achievement.icon),
            Cell::new(&a.achievement.name).add_attribute(Attribute::Bold),
            Cell::new(&a.achievement.description),
            Cell::new(a.achievement.points),
            if a.unlocked { progress.fg(Color::Green) } else { progress },
            opt_cell(a.unlocked_at.map(|d| d.with_timezone(&Local).format("%Y-%m-%d").to_string())),
        ]);
    }
    println!("{table}");
}

fn print_achievements_csv(achievements: &[AchievementWithProgress]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["ID", "Name", "Category", "Points", "Progress_Pct", "Unlocked_At"])?;
    for a in achievements {
        writer.write_record([
            a.achievement.id.clone(),
            a.achievement.name.clone(),
            a.achievement.category.to_string(),
            a.achievement.points.to_string(),
            format!("{:.1}", a.progress),
            a.unlocked_at.map(|d| d.to_rfc3339()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_profile_table(
    profile: &Profile,
    info: &SubscriptionInfo,
    header_color: Color,
    units: Units,
) {
    let mut table = new_table(&["Field", "Value"], header_color);
    let rows = [
        ("Username", profile.username.clone()),
        ("Display name", profile.display_name.clone().unwrap_or_default()),
        ("Bio", profile.bio.clone().unwrap_or_default()),
        ("Height", units.format_length(profile.height_cm)),
        ("Weight", units.format_weight(profile.weight_kg)),
        ("Units", profile.unit_system.to_string()),
        (
            "Experience",
            profile.experience_level.map(|l| l.to_string()).unwrap_or_default(),
        ),
        (
            "Plan",
            if info.is_premium { "premium" } else { "free" }.to_string(),
        ),
        ("Member since", profile.created_at.with_timezone(&Local).format("%Y-%m-%d").to_string()),
    ];
    for (field, value) in rows {
        table.add_row(vec![Cell::new(field), Cell::new(value)]);
    }
    println!("{table}");
}

fn print_subscription(info: &SubscriptionInfo) {
    println!("Status: {}", info.status);
    println!("Premium: {}", if info.is_premium { "yes" } else { "no" });
    if let Some(ends_at) = info.ends_at {
        println!("Current period ends: {}", local_date(ends_at));
    }
}

fn print_subscription_events_table(events: &[SubscriptionEvent], header_color: Color) {
    let mut table = new_table(&["When (Local)", "Event", "Stripe event"], header_color);
    for event in events {
        table.add_row(vec![
            Cell::new(local_date(event.created_at)),
            Cell::new(&event.event_type),
            opt_cell(event.stripe_event_id.as_ref()),
        ]);
    }
    println!("{table}");
}

fn print_generated_section(
    title: &str,
    exercises: &[gym_tracker_lib::insights::GeneratedExercise],
    header_color: Color,
) {
    if exercises.is_empty() {
        return;
    }
    println!("{title}");
    let mut table = new_table(&["Exercise", "Sets", "Reps", "Rest", "Notes"], header_color);
    for ex in exercises {
        table.add_row(vec![
            Cell::new(&ex.name).add_attribute(Attribute::Bold),
            Cell::new(ex.sets),
            Cell::new(&ex.reps),
            Cell::new(format_duration(u64::from(ex.rest_seconds))),
            opt_cell(ex.notes.as_ref()),
        ]);
    }
    println!("{table}");
}

fn print_insight(insight: &Insight) {
    use gym_tracker_lib::insights::InsightType;
    let icon = match insight.insight_type {
        InsightType::Recommendation => "💡",
        InsightType::Analysis => "📊",
        InsightType::Warning => "⚠️",
        InsightType::Celebration => "🎉",
    };
    println!("{icon} {}\n   {}\n", insight.title, insight.content);
}

fn print_insights_csv(insights: &[Insight]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["ID", "Type", "Title", "Content"])?;
    for insight in insights {
        writer.write_record([
            insight.id.clone(),
            insight.insight_type.to_string(),
            insight.title.clone(),
            insight.content.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
