//! bustrack cli - Live bus positions from report logs or a JSON lines session

use std::fs::{self, File};
use std::io::{self, BufWriter};

use argopt::{cmd_group, subcmd};
use csv::{ReaderBuilder, Trim};
use log::info;
use serde::{Deserialize, Serialize};

use bustrack::accounts::AdminAccount;
use bustrack::sources::CsvSource;
use bustrack::{
    FieldsConfiguration, FleetService, GpxGenerator, PositionRecord, SimulationConfig,
    StatsSnapshot,
};

/// CLI of bustrack - Track the latest position of every bus
#[cmd_group(commands = [replay, session])]
fn main() -> Result<(), String> {}

/// Replay a CSV file of device reports and print the resulting fleet
#[subcmd]
fn replay(
    /// CSV file with the device reports, in arrival order
    csv_path: String,
    /// Also simulate this many buses after the replay
    #[opt(long)]
    simulate: Option<i64>,
    /// Write the fleet as GPX waypoints to this path
    #[opt(long)]
    gpx: Option<String>,
    /// Fields and simulation configuration. Default: .bustrack.yaml, ~/.bustrack.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logging();

    let configs = load_configs(config);

    let csv = File::open(csv_path)
        .map_err(|e| format!("Failed on open the CSV file: {}", e.to_string()))?;
    let rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(csv);

    let mut source = CsvSource::new(rdr, Some(configs.fields));

    let service = FleetService::new(configs.simulation);

    let summary = service.replay(&mut source).map_err(|e| e.to_string())?;
    info!(
        "Replayed {} reports, {} rejected",
        summary.accepted, summary.rejected
    );

    if let Some(count) = simulate {
        service
            .simulate(Some(count), None)
            .map_err(|e| e.to_string())?;
    }

    let positions = service.list_positions().map_err(|e| e.to_string())?;
    let stats = service.get_stats().map_err(|e| e.to_string())?;

    if let Some(destination) = gpx {
        let destination = File::create(destination)
            .map_err(|e| format!("Failed on create the destination file: {}", e.to_string()))?;

        let doc = GpxGenerator::from_records(&positions).generate();

        let mut writer = BufWriter::new(destination);
        gpx::write(&doc, &mut writer).map_err(|e| e.to_string())?;
    }

    let output = ReplayOutput {
        accepted: summary.accepted,
        rejected: summary.rejected,
        stats,
        positions,
    };
    let stdout = io::stdout();
    serde_json::to_writer_pretty(stdout.lock(), &output).map_err(|e| e.to_string())?;
    println!();

    Ok(())
}

/// Serve JSON lines requests from stdin, one response line per request
#[subcmd]
fn session(
    /// Fields and simulation configuration. Default: .bustrack.yaml, ~/.bustrack.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logging();

    let configs = load_configs(config);

    let service = FleetService::new(configs.simulation);
    if let Some(admin) = &configs.admin {
        service
            .accounts()
            .seed_admin(admin)
            .map_err(|e| e.to_string())?;
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let handled = bustrack::session::run(&service, stdin.lock(), stdout.lock())
        .map_err(|e| format!("Session failed: {}", e.to_string()))?;

    info!("Session closed after {} requests", handled);

    Ok(())
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Load the current config
fn load_configs(provided: Option<String>) -> Configs {
    let mut options = vec![];

    if let Some(sprovided) = provided {
        options.push(sprovided);
    }

    options.push(".bustrack.yaml".to_string());

    if let Some(home) = dirs::home_dir() {
        if let Some(shome) = home.to_str() {
            options.push(format!("{}/.bustrack.yaml", shome));
        }
    }

    let mut yaml: Option<String> = None;
    for fi in options {
        if let Ok(s) = fs::read_to_string(fi) {
            yaml = Some(s);
            break;
        }
    }

    if let Some(s) = yaml {
        match serde_yaml::from_str::<Configs>(&s) {
            Ok(conf) => return conf,
            Err(e) => log::warn!("Ignoring invalid configuration: {}", e),
        }
    }

    Configs::default()
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct Configs {
    pub fields: FieldsConfiguration,
    pub simulation: SimulationConfig,
    pub admin: Option<AdminAccount>,
}

#[derive(Serialize)]
struct ReplayOutput {
    accepted: usize,
    rejected: usize,
    stats: StatsSnapshot,
    positions: Vec<PositionRecord>,
}

#[test]
fn parse_configs() -> Result<(), String> {
    let yaml = "\nfields:\n  device_id: dev_id\nsimulation:\n  count: 12";

    let conf: Configs = serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;

    assert_eq!(
        Configs {
            fields: FieldsConfiguration {
                device_id: "dev_id".to_string(),
                coordinates: "coordinates".to_string(),
                speed: "speed".to_string(),
                direction: "direction".to_string(),
                flip_coordinates: false,
            },
            simulation: SimulationConfig {
                count: 12,
                center_lat: 33.88,
                center_lon: 10.1,
            },
            admin: None,
        },
        conf
    );

    let yaml = "\nadmin:\n  name: Administrator\n  email: admin@example.com\n  password: admin123";

    let conf: Configs = serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;

    assert_eq!(FieldsConfiguration::default(), conf.fields);
    assert_eq!(SimulationConfig::default(), conf.simulation);
    assert_eq!(
        Some("admin@example.com".to_string()),
        conf.admin.map(|a| a.email)
    );

    Ok(())
}
