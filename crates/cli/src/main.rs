use clap::{Parser, Subcommand};
use ems_core::dispatch::legal_successor;
use ems_core::vehicle::VehicleType;
use ems_core::{
    Actor, CoreConfig, DispatchSystem, IncidentReport, IncidentStatus, Role, VehicleRegistration,
};

#[derive(Parser)]
#[command(name = "ems")]
#[command(about = "EMS incident dispatch coordinator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the incident lifecycle transition table
    Transitions,
    /// File an incident report and print the stored record
    Report {
        /// Caller name
        caller_name: String,
        /// Caller phone number
        caller_phone: String,
        /// Incident address
        address: String,
        /// Reported patient condition
        condition: String,
        /// Priority (low, medium, high, critical)
        #[arg(long)]
        priority: Option<String>,
    },
    /// Run a scripted dispatch lifecycle in-process and print each step
    Simulate,
}

const ALL_STATUSES: [IncidentStatus; 7] = [
    IncidentStatus::Reported,
    IncidentStatus::Dispatched,
    IncidentStatus::EnRoute,
    IncidentStatus::OnScene,
    IncidentStatus::Transporting,
    IncidentStatus::Completed,
    IncidentStatus::Cancelled,
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Transitions) => {
            for current in ALL_STATUSES {
                let successors: Vec<&str> = ALL_STATUSES
                    .into_iter()
                    .filter(|&next| legal_successor(current, next).is_ok())
                    .map(IncidentStatus::as_str)
                    .collect();
                if successors.is_empty() {
                    println!("{current}: (terminal)");
                } else {
                    println!("{current}: {}", successors.join(", "));
                }
            }
        }
        Some(Commands::Report {
            caller_name,
            caller_phone,
            address,
            condition,
            priority,
        }) => {
            let system = DispatchSystem::new(CoreConfig::default());
            let operator = Actor::new("cli-operator", Role::Dispatcher);
            let report = IncidentReport {
                priority: priority.map(|p| p.parse()).transpose()?,
                caller_name,
                caller_phone,
                address,
                patient_condition: condition,
                ..IncidentReport::default()
            };
            let incident = system.incidents.report(&operator, report)?;
            println!("{}", serde_json::to_string_pretty(&incident)?);
        }
        Some(Commands::Simulate) => simulate()?,
        None => {
            println!("No command given. Try `ems transitions` or `ems simulate`.");
        }
    }

    Ok(())
}

/// Walks one incident through report, dispatch and the full response
/// lifecycle against an in-process coordinator.
fn simulate() -> Result<(), Box<dyn std::error::Error>> {
    let system = DispatchSystem::new(CoreConfig::default());
    let dispatcher = Actor::new("sim-dispatcher", Role::Dispatcher);
    let admin = Actor::new("sim-admin", Role::Admin);

    let vehicle = system.vehicles.register(
        &admin,
        VehicleRegistration {
            id: "AMB-01".into(),
            call_sign: "Rescue 1".into(),
            vehicle_number: "KA-01-1234".into(),
            base_station: "Central".into(),
            vehicle_type: VehicleType::AdvancedLifeSupport,
            crew: Vec::new(),
        },
    )?;
    println!("registered vehicle {} ({})", vehicle.id, vehicle.call_sign);

    let incident = system.incidents.report(
        &dispatcher,
        IncidentReport {
            caller_name: "Bystander".into(),
            caller_phone: "+44 20 7946 0000".into(),
            address: "12 High Street".into(),
            patient_condition: "collapsed, breathing".into(),
            ..IncidentReport::default()
        },
    )?;
    println!("reported incident {}", incident.id);

    let incident = system
        .coordinator
        .dispatch(&dispatcher, &incident.id, &vehicle.id)?;
    println!("dispatched {} to {}", vehicle.id, incident.id);

    let crew = Actor::new("sim-medic", Role::Paramedic).with_vehicle(&vehicle.id);
    for next in [
        IncidentStatus::EnRoute,
        IncidentStatus::OnScene,
        IncidentStatus::Transporting,
        IncidentStatus::Completed,
    ] {
        let incident = system.coordinator.advance(&crew, &incident.id, next)?;
        println!("incident {} is now {}", incident.id, incident.status);
    }

    let nurse = Actor::new("sim-nurse", Role::Nurse);
    let handoff = system.handoffs.acknowledge(&nurse, &incident.id)?;
    println!(
        "ER acknowledged {} at {}",
        handoff.incident_id, handoff.acknowledged_at
    );

    Ok(())
}
