// src/session_loop.rs
//! Line-oriented driver for an in-progress workout.
use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use std::io::{stdin, stdout, BufRead, Write};

use gym_tracker_lib::session::{
    CardioLog, SetType, SetUpdate, WorkoutDetails, WorkoutSession, RPE_RANGE,
};
use gym_tracker_lib::time_format::{format_duration, format_time};
use gym_tracker_lib::{AppService, FinishSummary, Units};

const HELP: &str = "\
Commands (exercise and set numbers start at 1, weights in your display units):
  add <exercise>                  add an exercise by id or name
  set <ex> [reps] [weight]        add a set (copies the previous set when omitted)
  done <ex> <set> [reps] [weight] [rpe]
                                  complete a set and start the rest timer
  undo <ex> <set>                 mark a set as not done
  type <ex> <set> <kind>          warmup | working | dropset | failure | amrap
  rm <ex> [set]                   remove a set, or the whole exercise
  cardio <ex> <minutes> [distance] [avg-hr]
  note <ex> <text>                notes for one exercise
  rest [seconds] | rest stop      start or stop the rest timer
  pause | resume
  rate <1-5> | notes <text> | rpe <1-10> | calories <kcal>
  status                          show the workout so far
  finish | cancel | help";

enum Outcome {
    Continue,
    Finished,
    Cancelled,
}

/// Runs the prompt until the workout is finished, cancelled, or stdin closes.
/// Closing stdin finishes the workout so nothing logged is lost.
pub fn run(service: &mut AppService, session: &WorkoutSession, header_color: Color) -> Result<()> {
    println!("Started '{}'. Type 'help' for commands.", session.name);
    if !service.workout.exercise_logs().is_empty() {
        print_status(service, header_color);
    }

    let stdin = stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{}> ", prompt(service));
        stdout().flush().context("Failed to flush prompt")?;

        let Some(line) = lines.next() else {
            println!();
            finish(service)?;
            return Ok(());
        };
        let line = line.context("Failed to read input")?;
        match handle_line(service, line.trim(), header_color) {
            Ok(Outcome::Continue) => {}
            Ok(Outcome::Finished | Outcome::Cancelled) => return Ok(()),
            Err(e) => println!("Error: {e}"),
        }
    }
}

fn prompt(service: &AppService) -> String {
    let workout = &service.workout;
    let mut parts = vec![format_time(workout.elapsed_seconds())];
    if workout.is_paused() {
        parts.push("paused".to_string());
    }
    let rest = workout.rest_timer_remaining();
    if rest > 0 {
        parts.push(format!("rest {}", format_time(rest)));
    }
    format!("[{}] ", parts.join(" | "))
}

fn handle_line(service: &mut AppService, line: &str, header_color: Color) -> Result<Outcome> {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();
    let units = service.units();

    match cmd.to_lowercase().as_str() {
        "" => {}
        "help" | "?" => println!("{HELP}"),
        "add" => {
            if rest.trim().is_empty() {
                bail!("Usage: add <exercise>");
            }
            let index = service.add_exercise(rest.trim())?;
            let log = &service.workout.exercise_logs()[index];
            println!("#{} {}", index + 1, log.exercise.name);
        }
        "set" => {
            let ex = index_arg(&args, 0, "exercise")?;
            let set = service
                .workout
                .add_set(ex)
                .with_context(|| format!("No exercise #{}", ex + 1))?;
            let update = SetUpdate {
                reps: opt_arg(&args, 1)?,
                weight_kg: units.to_metric_weight(opt_arg(&args, 2)?),
                ..SetUpdate::default()
            };
            service.workout.update_set(ex, set, update);
            println!("Added set {} to #{}", set + 1, ex + 1);
        }
        "done" => {
            let ex = index_arg(&args, 0, "exercise")?;
            let set = index_arg(&args, 1, "set")?;
            let rpe: Option<f64> = opt_arg(&args, 4)?;
            if rpe.is_some_and(|r| !RPE_RANGE.contains(&r)) {
                bail!("RPE must be between 1 and 10.");
            }
            let update = SetUpdate {
                reps: opt_arg(&args, 2)?,
                weight_kg: units.to_metric_weight(opt_arg(&args, 3)?),
                rpe,
                ..SetUpdate::default()
            };
            let completion = service.complete_set(ex, set, update)?;
            if completion.is_pr {
                println!("🏆 New personal record!");
            }
            let seconds = service.start_rest_timer(None);
            println!("Set {} done. Rest {}.", set + 1, format_duration(u64::from(seconds)));
        }
        "undo" => {
            let ex = index_arg(&args, 0, "exercise")?;
            let set = index_arg(&args, 1, "set")?;
            if !service.workout.uncomplete_set(ex, set) {
                bail!("No set {} for exercise #{}", set + 1, ex + 1);
            }
        }
        "type" => {
            let ex = index_arg(&args, 0, "exercise")?;
            let set = index_arg(&args, 1, "set")?;
            let kind: SetType = args
                .get(2)
                .context("Usage: type <ex> <set> <kind>")?
                .parse()
                .context("Unknown set type")?;
            let update = SetUpdate {
                set_type: Some(kind),
                ..SetUpdate::default()
            };
            if !service.workout.update_set(ex, set, update) {
                bail!("No set {} for exercise #{}", set + 1, ex + 1);
            }
        }
        "rm" => {
            let ex = index_arg(&args, 0, "exercise")?;
            let removed = match args.get(1) {
                Some(_) => {
                    let set = index_arg(&args, 1, "set")?;
                    service.workout.remove_set(ex, set)
                }
                None => service.workout.remove_exercise(ex),
            };
            if !removed {
                bail!("Nothing to remove there.");
            }
        }
        "cardio" => {
            let ex = index_arg(&args, 0, "exercise")?;
            let minutes: f64 = opt_arg(&args, 1)?.context("Usage: cardio <ex> <minutes> [distance] [avg-hr]")?;
            let patch = CardioLog {
                duration_sec: Some((minutes * 60.0).round() as u64),
                distance_km: units.to_metric_distance(opt_arg(&args, 2)?),
                avg_heart_rate: opt_arg(&args, 3)?,
                ..CardioLog::default()
            };
            if !service.workout.update_cardio_log(ex, patch) {
                bail!("Exercise #{} is not a cardio exercise.", ex + 1);
            }
        }
        "note" => {
            let ex = index_arg(&args, 0, "exercise")?;
            let text = rest.trim().splitn(2, ' ').nth(1).unwrap_or("").trim();
            if !service.workout.set_exercise_notes(ex, text) {
                bail!("No exercise #{}", ex + 1);
            }
        }
        "rest" => match args.first() {
            Some(&"stop") => service.workout.cancel_rest_timer(),
            _ => {
                let seconds = service.start_rest_timer(opt_arg(&args, 0)?);
                println!("Resting {}.", format_duration(u64::from(seconds)));
            }
        },
        "pause" => {
            if !service.workout.pause() {
                println!("Already paused.");
            }
        }
        "resume" => {
            if !service.workout.resume() {
                println!("Not paused.");
            }
        }
        "rate" => {
            let rating: u8 = opt_arg(&args, 0)?.context("Usage: rate <1-5>")?;
            if !(1..=5).contains(&rating) {
                bail!("Rating must be between 1 and 5.");
            }
            service.workout.update_details(WorkoutDetails {
                rating: Some(rating),
                ..WorkoutDetails::default()
            });
        }
        "rpe" => {
            let rpe: u8 = opt_arg(&args, 0)?.context("Usage: rpe <1-10>")?;
            if !(1..=10).contains(&rpe) {
                bail!("Perceived exertion must be between 1 and 10.");
            }
            service.workout.update_details(WorkoutDetails {
                perceived_exertion: Some(rpe),
                ..WorkoutDetails::default()
            });
        }
        "calories" => {
            service.workout.update_details(WorkoutDetails {
                calories_burned: Some(opt_arg(&args, 0)?.context("Usage: calories <kcal>")?),
                ..WorkoutDetails::default()
            });
        }
        "notes" => {
            service.workout.update_details(WorkoutDetails {
                notes: Some(rest.trim().to_string()),
                ..WorkoutDetails::default()
            });
        }
        "status" | "ls" => print_status(service, header_color),
        "finish" | "end" => {
            finish(service)?;
            return Ok(Outcome::Finished);
        }
        "cancel" => {
            service.cancel_workout();
            println!("Workout cancelled. Nothing was saved.");
            return Ok(Outcome::Cancelled);
        }
        other => bail!("Unknown command '{}'. Type 'help'.", other),
    }
    Ok(Outcome::Continue)
}

/// 1-based argument to 0-based index.
fn index_arg(args: &[&str], pos: usize, what: &str) -> Result<usize> {
    let raw = args
        .get(pos)
        .with_context(|| format!("Missing {what} number"))?;
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => bail!("Invalid {} number '{}'", what, raw),
    }
}

fn opt_arg<T: std::str::FromStr>(args: &[&str], pos: usize) -> Result<Option<T>> {
    match args.get(pos) {
        None => Ok(None),
        Some(raw) => match raw.parse() {
            Ok(value) => Ok(Some(value)),
            Err(_) => bail!("Invalid value '{}'", raw),
        },
    }
}

fn print_status(service: &AppService, header_color: Color) {
    let units = service.units();
    let workout = &service.workout;
    let Some(session) = workout.session() else {
        println!("No workout in progress.");
        return;
    };
    println!(
        "{} · {} · {} sets · {}",
        session.name,
        format_time(workout.elapsed_seconds()),
        workout.total_sets(),
        units.format_volume(workout.total_volume())
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(header_color),
            Cell::new("Exercise").fg(header_color),
            Cell::new("Set").fg(header_color),
            Cell::new("Type").fg(header_color),
            Cell::new(format!("Weight ({})", units.weight_unit())).fg(header_color),
            Cell::new("Reps").fg(header_color),
            Cell::new("Done").fg(header_color),
        ]);

    for (i, log) in workout.exercise_logs().iter().enumerate() {
        if let Some(cardio) = &log.cardio_log {
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(&log.exercise.name),
                Cell::new("cardio"),
                Cell::new(""),
                Cell::new(format_duration(cardio.duration_sec.unwrap_or(0))),
                Cell::new(units.format_distance(cardio.distance_km)),
                Cell::new(""),
            ]);
        }
        if log.sets.is_empty() && log.cardio_log.is_none() {
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(&log.exercise.name),
                Cell::new("-"),
            ]);
        }
        for (j, set) in log.sets.iter().enumerate() {
            let done = match (set.is_completed(), set.is_pr) {
                (true, true) => Cell::new("✓ PR").fg(Color::Yellow),
                (true, false) => Cell::new("✓").fg(Color::Green),
                _ => Cell::new(""),
            };
            table.add_row(vec![
                Cell::new(if j == 0 { (i + 1).to_string() } else { String::new() }),
                Cell::new(if j == 0 { log.exercise.name.as_str() } else { "" }),
                Cell::new(set.set_number),
                Cell::new(set.set_type),
                Cell::new(display_weight(units, set.weight_kg)),
                Cell::new(set.reps.map_or_else(|| "-".to_string(), |r| r.to_string())),
                done,
            ]);
        }
    }
    println!("{table}");
}

fn display_weight(units: Units, kg: Option<f64>) -> String {
    units
        .convert_weight(kg)
        .map_or_else(|| "-".to_string(), |w| w.to_string())
}

fn finish(service: &mut AppService) -> Result<()> {
    match service.finish_workout()? {
        Some(summary) => print_summary(service, &summary),
        None => println!("No workout in progress."),
    }
    Ok(())
}

fn print_summary(service: &AppService, summary: &FinishSummary) {
    let units = service.units();
    let workout = &summary.workout;
    println!("Workout complete: {}", workout.name);
    println!("  Duration: {}", format_duration(workout.duration));
    println!("  Exercises: {}", workout.exercises.len());
    println!("  Sets: {}", workout.completed_sets());
    println!("  Volume: {}", units.format_volume(workout.volume));
    if service.user.is_some() && !summary.persisted {
        println!("  Saved locally only; the database copy could not be written.");
    }
    for achievement in &summary.new_achievements {
        println!(
            "{} Achievement unlocked: {} (+{} pts)",
            achievement.icon, achievement.name, achievement.points
        );
    }
}
