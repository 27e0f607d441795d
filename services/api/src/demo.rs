use crate::infra::{parse_date, parse_reference_day, InMemoryNotificationPublisher};
use chrono::{Datelike, Local, NaiveDate};
use clap::Args;
use clubroll::error::AppError;
use clubroll::roster::{
    age_on, AgeRange, AllocationOutcome, Club, ClubId, Gender, InMemoryRosterStore, NewClub,
    NewMember, NewUnit, NotificationPublisher, ReferenceDatePolicy, RosterError, RosterServices,
    RosterStore, TaskStatus, UnitGender,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Allocation year (defaults to the current year)
    #[arg(long)]
    pub(crate) year: Option<i32>,
    /// Override the registration date (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Reference day for ages as MM-DD (defaults to 06-01)
    #[arg(long, value_parser = parse_reference_day)]
    pub(crate) reference: Option<ReferenceDatePolicy>,
    /// Member roster CSV to import instead of the built-in sample members
    #[arg(long)]
    pub(crate) members_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct AgeArgs {
    /// Birth date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) birth_date: NaiveDate,
    /// Allocation year (defaults to the current year)
    #[arg(long)]
    pub(crate) year: Option<i32>,
    /// Reference day for ages as MM-DD (defaults to 06-01)
    #[arg(long, value_parser = parse_reference_day)]
    pub(crate) reference: Option<ReferenceDatePolicy>,
}

pub(crate) fn run_age(args: AgeArgs) -> Result<(), AppError> {
    let today = Local::now().date_naive();
    let year = args.year.unwrap_or_else(|| today.year());
    let policy = args.reference.unwrap_or_default();
    let reference_date = policy.reference_date(year).ok_or(RosterError::Validation {
        field: "year",
        reason: format!("{year} is out of range"),
    })?;

    println!(
        "Born {} | reference day {} | age {} (today {})",
        args.birth_date,
        reference_date,
        age_on(args.birth_date, reference_date),
        age_on(args.birth_date, today)
    );
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        year,
        today,
        reference,
        members_csv,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let year = year.unwrap_or_else(|| today.year());
    let policy = reference.unwrap_or_default();
    let notifier = Arc::new(InMemoryNotificationPublisher::default());
    let services = RosterServices::new(
        Arc::new(InMemoryRosterStore::default()),
        notifier.clone(),
        policy,
    );

    println!("Club roster demo");
    let club = seed_club(&services)?;
    println!("Club: {} ({})", club.name, club.id);

    match members_csv {
        Some(path) => {
            let report = services
                .importer()
                .import_path(&path, &club.id, today)?;
            println!(
                "Imported {} members from {}",
                report.imported.len(),
                path.display()
            );
            for rejected in &report.rejected {
                println!("  ! line {}: {}", rejected.line, rejected.reason);
            }
        }
        None => {
            let seeded = seed_members(&services, &club.id, year, today)?;
            println!("Registered {seeded} sample members");
        }
    }

    if let Some(reference_date) = policy.reference_date(year) {
        println!("\nAllocation for {year} (ages on {reference_date})");
    }
    for line in allocate_pending(&services, &club.id, year, today)? {
        println!("- {line}");
    }

    println!("\nUnits");
    for unit in services.roster.units(&club.id)? {
        let seated = services.roster.members(&club.id, Some(&unit.id))?.len();
        println!(
            "  - {} ({}, ages {}): {}/{}",
            unit.name, unit.gender, unit.age_range, seated, unit.capacity
        );
    }

    let open_tasks = services
        .allocation
        .tasks(&club.id, Some(TaskStatus::Open))?;
    println!(
        "\n{} open capacity task(s) | {} notification(s) queued",
        open_tasks.len(),
        notifier.sent().len()
    );
    Ok(())
}

fn seed_club<S, N>(services: &RosterServices<S, N>) -> Result<Club, AppError>
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    let club = services.roster.create_club(NewClub {
        name: "Riverside Scouts".to_string(),
        description: Some("Sample club for the allocation demo".to_string()),
    })?;

    let units = [
        ("Beavers", UnitGender::Mixed, (6, 7), 2),
        ("Cubs", UnitGender::Mixed, (8, 10), 3),
        ("Brownies", UnitGender::Female, (8, 10), 2),
        ("Scouts", UnitGender::Mixed, (11, 14), 2),
    ];
    for (name, gender, (min, max), capacity) in units {
        services.roster.create_unit(
            &club.id,
            NewUnit {
                name: name.to_string(),
                gender,
                age_range: AgeRange::new(min, max),
                capacity,
            },
        )?;
    }
    Ok(club)
}

fn seed_members<S, N>(
    services: &RosterServices<S, N>,
    club_id: &ClubId,
    year: i32,
    today: NaiveDate,
) -> Result<usize, AppError>
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    // (first, last, age on the reference day, birth month, gender)
    let members = [
        ("Mia", "Adler", 7, 2, Gender::Female),
        ("Noah", "Brandt", 6, 1, Gender::Male),
        ("Liam", "Carter", 7, 4, Gender::Male),
        ("Emma", "Dorsey", 9, 3, Gender::Female),
        ("Oliver", "Evans", 9, 5, Gender::Male),
        ("Ava", "Fischer", 12, 1, Gender::Female),
        ("Lucas", "Grant", 16, 2, Gender::Male),
    ];

    let mut seeded = 0;
    for (first_name, last_name, age, month, gender) in members {
        let Some(birth_date) = NaiveDate::from_ymd_opt(year - age, month, 15) else {
            continue;
        };
        services.roster.register_member(
            club_id,
            NewMember {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                birth_date,
                gender,
                email: None,
                unit_id: None,
            },
            today,
        )?;
        seeded += 1;
    }
    Ok(seeded)
}

/// Runs the allocation rule for every member without a unit and describes each result.
fn allocate_pending<S, N>(
    services: &RosterServices<S, N>,
    club_id: &ClubId,
    year: i32,
    today: NaiveDate,
) -> Result<Vec<String>, AppError>
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    let mut lines = Vec::new();
    for member in services.roster.members(club_id, None)? {
        if member.unit_id.is_some() {
            continue;
        }

        let name = member.full_name();
        let line = match services.allocation.allocate(&member.id, year, today) {
            Ok(AllocationOutcome::Assigned {
                reference_age,
                unit,
                ..
            }) => format!("{name} (age {reference_age}): assigned to {}", unit.name),
            Ok(AllocationOutcome::ChoiceRequired {
                reference_age,
                candidates,
                ..
            }) => {
                let options = candidates
                    .iter()
                    .map(|unit| format!("{} {}/{}", unit.name, unit.occupancy, unit.capacity))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{name} (age {reference_age}): choose from {options}")
            }
            Ok(AllocationOutcome::CapacityExceeded {
                reference_age,
                task,
                ..
            }) => format!(
                "{name} (age {reference_age}): every matching unit is full, task {} opened",
                task.id
            ),
            Err(RosterError::NoMatchingUnit { reference_age, .. }) => {
                format!("{name} (age {reference_age}): no unit takes this age")
            }
            Err(err) => return Err(err.into()),
        };
        lines.push(line);
    }
    Ok(lines)
}
