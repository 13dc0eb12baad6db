use energy_meter_setup::{
    cli::Options,
    meter::survey,
    parameters::{self, BaudRateOutcome, SerialNumbers, UnitIdOutcome},
    registers::RegisterCatalog,
    relay::{self, RelayOutcome},
    voltage::check_voltage,
    MeterClient, MeterError, ModbusLink, Reading, SetupConfig, Transport,
};
use log::{error, info};
use serde::Serialize;

#[derive(Serialize)]
struct SurveyLine<'a> {
    register: &'a str,
    #[serde(flatten)]
    reading: &'a Reading,
}

async fn print_survey<T: Transport>(client: &mut MeterClient<T>, json: bool) -> Result<(), MeterError> {
    let readings = survey(client).await?;
    let supported: Vec<SurveyLine> = readings
        .iter()
        .filter(|(_, reading)| reading.value.is_some())
        .map(|(name, reading)| SurveyLine { register: name.as_str(), reading })
        .collect();

    if json {
        match serde_json::to_string_pretty(&supported) {
            Ok(text) => println!("{text}"),
            Err(e) => error!("Unable to serialize the readings: {e}"),
        }
        return Ok(());
    }
    for line in supported {
        if let Some(value) = &line.reading.value {
            println!("{}: {} {}", line.register, value, line.reading.info_text);
        }
    }
    return Ok(());
}

fn print_serial_numbers(serials: &SerialNumbers) {
    for (label, reading) in [("serial_number", &serials.integer), ("serial_number_binary", &serials.binary), ("serial_number_hex", &serials.hex)] {
        if let Some(value) = &reading.value {
            println!("{label}: {value}");
        }
    }
}

async fn run<T: Transport>(client: &mut MeterClient<T>, options: &Options, config: &SetupConfig) -> Result<(), MeterError> {
    check_voltage(client).await?;

    if options.curious {
        print_survey(client, options.json).await?;
    }

    if options.get_relay {
        let info = relay::inspect(client).await?;
        println!("relay_state: {}", info.state);
        println!("relay_key: {}", info.key);
    }
    if let Some(requested) = options.set_relay {
        match relay::set_state(client, requested).await? {
            RelayOutcome::Unchanged(state) | RelayOutcome::Changed(state) => println!("relay_state: {state}"),
            RelayOutcome::Unconfirmed { observed, .. } => println!("relay_state: {observed}"),
        }
    }

    if options.get_baudrate {
        println!("baud_rate: {}", parameters::read_baud_rate(client).await?);
    }
    if let Some(baud_rate) = options.set_baudrate {
        match parameters::set_baud_rate(client, baud_rate, config.settle_delay()).await? {
            BaudRateOutcome::Confirmed(b) | BaudRateOutcome::GatewayReconfigurationRequired(b) => println!("baud_rate: {b}"),
            BaudRateOutcome::Unconfirmed { observed, .. } => println!("baud_rate: {observed}"),
        }
    }

    if options.get_unit_id {
        println!("unit_id: {}", parameters::read_unit_id(client).await?);
    }
    if let Some(unit_id) = options.set_unit_id {
        match parameters::set_unit_id(client, unit_id).await? {
            UnitIdOutcome::Confirmed(id) => println!("unit_id: {id}"),
            UnitIdOutcome::Unconfirmed { observed, .. } => println!("unit_id: {observed}"),
        }
    }

    if options.get_serial {
        print_serial_numbers(&parameters::read_serial_numbers(client).await?);
    }
    if let Some(serial) = &options.set_serial {
        let change = parameters::set_serial_number(client, serial).await?;
        print_serial_numbers(&change.after);
    }
    return Ok(());
}

#[tokio::main]
async fn main() {
    let default_filter = std::env::var("EMS_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let options = Options::new();

    if let Err(problems) = RegisterCatalog::validate() {
        for problem in problems {
            error!("Register table: {problem}");
        }
        std::process::exit(1);
    }

    let mut config = match SetupConfig::load(options.config_file.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", MeterError::from(e));
            std::process::exit(1);
        }
    };
    options.apply_to(&mut config);

    let endpoint = match options.endpoint(&config) {
        Some(e) => e,
        None => {
            error!("Either a serial port or a gateway host is needed");
            std::process::exit(1);
        }
    };
    info!("Talking to a {} with unit id {} via {:?}", options.meter_model, config.unit_id, endpoint);

    let link = ModbusLink::new(endpoint, config.timeout(), config.retries);
    let mut client = MeterClient::new(options.meter_model, config.unit_id, link);

    let result = run(&mut client, &options, &config).await;
    client.close().await;

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}
