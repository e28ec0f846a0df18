use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use igloba_oi as oi;
use oi::{LedColor, MotorState, Robot, RobotConfig, SensorReading};
use serial_link as link;
use serial_link::SerialLink;

#[derive(Parser, Debug)]
#[command(
    name = "ed",
    version,
    about = "iGloba Ed robot vacuum controller",
    disable_help_subcommand = true
)]
struct Cli {
    /// Link backend (mock accepts commands and never answers queries)
    #[arg(long, value_enum, default_value_t = Backend::Mock, global = true)]
    backend: Backend,

    /// Serial device path, overrides the config file
    #[arg(long, global = true)]
    port: Option<String>,

    /// YAML config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print readings as JSON
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    json: bool,

    /// Print Prometheus counters when the session ends
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    Mock,
    Serial,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ModeArg {
    Passive,
    Safe,
    Full,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum TurnDir {
    Left,
    Right,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ColorArg {
    Off,
    Blue,
    Red,
    Both,
}

impl ColorArg {
    fn into_led(self) -> LedColor {
        match self {
            ColorArg::Off => LedColor::Off,
            ColorArg::Blue => LedColor::Blue,
            ColorArg::Red => LedColor::Red,
            ColorArg::Both => LedColor::BlueRed,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial ports visible to the backend
    Ports,
    /// Print the opcode and packet tables
    Table,
    /// Encode a command offline and print its bytes
    Encode {
        /// Command name from the opcode table (e.g., drive)
        name: String,
        /// Arguments, comma separated (e.g., -200,32767)
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        args: Vec<i32>,
    },
    /// Decode command bytes offline
    Explain {
        /// Bytes as hex, space-separated (e.g., "89 00 C8 7F FF")
        #[arg(value_delimiter = ' ', required = true)]
        bytes: Vec<String>,
    },
    /// Decode a sensor payload offline
    Decode {
        /// Packet id
        id: u8,
        /// Payload bytes as hex, space-separated
        #[arg(value_delimiter = ' ', required = true)]
        bytes: Vec<String>,
    },
    /// Start the Open Interface (passive mode)
    Start,
    /// Switch control mode
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
    },
    /// Reset the robot
    Reset,
    /// Leave the Open Interface
    StopOi,
    /// Power the robot off
    PowerOff,
    /// Drive with velocity (mm/s) and radius (mm)
    Drive {
        #[arg(long, allow_negative_numbers = true)]
        velocity: i32,
        #[arg(long, allow_negative_numbers = true, default_value_t = oi::RADIUS_STRAIGHT)]
        radius: i32,
    },
    /// Set each wheel velocity (mm/s)
    DriveDirect {
        #[arg(long, allow_negative_numbers = true)]
        left: i32,
        #[arg(long, allow_negative_numbers = true)]
        right: i32,
    },
    /// Set each wheel PWM duty (-255..=255)
    DrivePwm {
        #[arg(long, allow_negative_numbers = true)]
        left: i32,
        #[arg(long, allow_negative_numbers = true)]
        right: i32,
    },
    /// Drive straight ahead for a while, then stop
    Forward {
        /// Speed in mm/s (defaults to the config value)
        #[arg(long)]
        speed: Option<i32>,
        #[arg(long, default_value_t = 1.0)]
        seconds: f64,
    },
    /// Drive straight back for a while, then stop
    Backward {
        #[arg(long)]
        speed: Option<i32>,
        #[arg(long, default_value_t = 1.0)]
        seconds: f64,
    },
    /// Spin in place for a while, then stop
    Turn {
        #[arg(value_enum)]
        direction: TurnDir,
        #[arg(long, default_value_t = 1.0)]
        seconds: f64,
    },
    /// Stop moving
    Stop,
    /// Start a normal cleaning cycle
    Clean,
    /// Start a max cleaning cycle
    MaxClean,
    /// Return to the dock
    Dock,
    /// Set the LEDs
    Leds {
        #[arg(value_enum)]
        color: ColorArg,
        #[arg(long, default_value_t = 255)]
        intensity: u8,
    },
    /// Switch brushes and fan
    Motors {
        #[arg(long, action = ArgAction::SetTrue)]
        side_brush: bool,
        #[arg(long, action = ArgAction::SetTrue)]
        vacuum_fan: bool,
        #[arg(long, action = ArgAction::SetTrue)]
        main_brush: bool,
    },
    /// Read and decode one sensor packet
    Sensor { id: u8 },
    /// Read the summary packets (7, 11, 12, 13, 19)
    Sensors,
    /// Read several packets with one query-list request
    Query {
        #[arg(required = true)]
        ids: Vec<u8>,
    },
    /// Print a status digest
    Status,
    /// Stream packets and print a number of frames
    Stream {
        #[arg(required = true)]
        ids: Vec<u8>,
        #[arg(long, default_value_t = 10u32)]
        frames: u32,
    },
    /// Start, enter full mode, drive forward briefly and print status
    Demo,
}

#[derive(Clone, Copy, Debug)]
struct Output {
    json: bool,
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => oi::load_config_file(path)?,
        None => RobotConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    let out = Output { json: cli.json };

    match cli.command {
        Commands::Ports => ports(cli.backend),
        Commands::Table => table(),
        Commands::Encode { name, args } => encode_offline(&name, &args),
        Commands::Explain { bytes } => explain_offline(&bytes),
        Commands::Decode { id, bytes } => decode_offline(out, id, &bytes),
        command => match cli.backend {
            Backend::Mock => session::<link::MockLink>(&config, command, out, cli.metrics),
            Backend::Serial => session::<link::SerialPortLink>(&config, command, out, cli.metrics),
        },
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn ports(backend: Backend) -> Result<()> {
    let ports = match backend {
        Backend::Mock => link::MockLink::list()?,
        Backend::Serial => link::SerialPortLink::list()?,
    };
    for p in ports {
        println!("{}\t{}", p.name, p.driver);
    }
    Ok(())
}

fn table() -> Result<()> {
    let tables = serde_json::json!({
        "opcodes": oi::OPCODES,
        "packets": oi::PACKETS,
    });
    println!("{}", serde_json::to_string_pretty(&tables)?);
    Ok(())
}

fn encode_offline(name: &str, args: &[i32]) -> Result<()> {
    let bytes = oi::encode(name, args)?;
    println!("{}", oi::hex(&bytes));
    Ok(())
}

fn explain_offline(items: &[String]) -> Result<()> {
    let bytes = parse_hex_bytes(items)?;
    let (spec, args) = oi::decode_command(&bytes)?;
    print!("{} (opcode {})", spec.name, spec.opcode);
    for (arg, value) in spec.args.iter().zip(args) {
        print!(" {}={value}{}", arg.name, arg.unit);
    }
    println!();
    Ok(())
}

fn decode_offline(out: Output, id: u8, items: &[String]) -> Result<()> {
    let bytes = parse_hex_bytes(items)?;
    let reading = oi::decode_packet(id, &bytes)?;
    print_reading(out, &reading)
}

fn session<L: SerialLink>(
    config: &RobotConfig,
    command: Commands,
    out: Output,
    metrics: bool,
) -> Result<()> {
    let hub = if metrics {
        Some(oi::MetricsHub::new().context("registering metrics")?)
    } else {
        None
    };
    let mut robot =
        Robot::<L>::open(config).with_context(|| format!("opening {}", config.port))?;
    if let Some(h) = &hub {
        robot = robot.with_metrics(h.clone());
    }
    let outcome = run(&mut robot, config, command, out);
    let closed = robot.close();
    outcome?;
    closed?;
    if let Some(h) = hub {
        print!("{}", h.encode_text());
    }
    Ok(())
}

fn run<L: SerialLink>(
    robot: &mut Robot<L>,
    config: &RobotConfig,
    command: Commands,
    out: Output,
) -> Result<()> {
    match command {
        Commands::Start => robot.start()?,
        Commands::Mode { mode } => match mode {
            ModeArg::Passive => robot.start()?,
            ModeArg::Safe => robot.safe_mode()?,
            ModeArg::Full => robot.full_mode()?,
        },
        Commands::Reset => robot.reset()?,
        Commands::StopOi => robot.stop()?,
        Commands::PowerOff => robot.power_off()?,
        Commands::Drive { velocity, radius } => robot.drive(velocity, radius)?,
        Commands::DriveDirect { left, right } => robot.drive_direct(left, right)?,
        Commands::DrivePwm { left, right } => robot.drive_pwm(left, right)?,
        Commands::Forward { speed, seconds } => robot.move_forward(
            speed.unwrap_or(config.default_speed_mm_s),
            seconds_arg(seconds)?,
        )?,
        Commands::Backward { speed, seconds } => robot.move_backward(
            speed.unwrap_or(config.default_speed_mm_s),
            seconds_arg(seconds)?,
        )?,
        Commands::Turn { direction, seconds } => match direction {
            TurnDir::Left => robot.turn_left(seconds_arg(seconds)?)?,
            TurnDir::Right => robot.turn_right(seconds_arg(seconds)?)?,
        },
        Commands::Stop => robot.stop_movement()?,
        Commands::Clean => robot.clean()?,
        Commands::MaxClean => robot.max_clean()?,
        Commands::Dock => robot.seek_dock()?,
        Commands::Leds { color, intensity } => robot.leds(color.into_led(), intensity)?,
        Commands::Motors {
            side_brush,
            vacuum_fan,
            main_brush,
        } => robot.motors(MotorState {
            side_brush,
            vacuum_fan,
            main_brush,
        })?,
        Commands::Sensor { id } => {
            let reading = robot.read_and_parse_sensor(id)?;
            print_reading(out, &reading)?;
        }
        Commands::Sensors => {
            let snap = robot.get_all_sensors()?;
            if out.json {
                println!("{}", serde_json::to_string_pretty(&snap)?);
            } else {
                for (name, value) in &snap.fields {
                    println!("{name}\t{value}");
                }
                for f in &snap.failures {
                    eprintln!("packet {}: {}", f.packet_id, f.error);
                }
            }
        }
        Commands::Query { ids } => {
            for reading in robot.query_list(&ids)? {
                print_reading(out, &reading)?;
            }
        }
        Commands::Status => print_status(out, robot)?,
        Commands::Stream { ids, frames } => stream(robot, &ids, frames, out)?,
        Commands::Demo => demo(robot, config, out)?,
        Commands::Ports
        | Commands::Table
        | Commands::Encode { .. }
        | Commands::Explain { .. }
        | Commands::Decode { .. } => anyhow::bail!("offline command needs no session"),
    }
    Ok(())
}

fn stream<L: SerialLink>(robot: &mut Robot<L>, ids: &[u8], frames: u32, out: Output) -> Result<()> {
    robot.start_stream(ids)?;
    for _ in 0..frames {
        match robot.read_stream_frame() {
            Ok(readings) => {
                for r in &readings {
                    print_reading(out, r)?;
                }
            }
            Err(e) if !e.is_fatal() => warn!(error = %e, "stream frame dropped"),
            Err(e) => return Err(e.into()),
        }
    }
    robot.pause_stream()?;
    Ok(())
}

fn demo<L: SerialLink>(robot: &mut Robot<L>, config: &RobotConfig, out: Output) -> Result<()> {
    robot.start()?;
    thread::sleep(Duration::from_millis(500));
    robot.full_mode()?;
    match robot.read_and_parse_sensor(19) {
        Ok(r) => info!(mode = ?r.get("operating_mode"), "current mode"),
        Err(e) if !e.is_fatal() => warn!(error = %e, "could not read operating mode"),
        Err(e) => return Err(e.into()),
    }
    robot.move_forward(config.default_speed_mm_s, Duration::from_millis(1500))?;
    print_status(out, robot)?;
    println!("demo complete");
    Ok(())
}

fn print_status<L: SerialLink>(out: Output, robot: &mut Robot<L>) -> Result<()> {
    let status = robot.sensor_status()?;
    if out.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{status}");
    }
    Ok(())
}

fn print_reading(out: Output, reading: &SensorReading) -> Result<()> {
    if out.json {
        println!("{}", serde_json::to_string(reading)?);
        return Ok(());
    }
    println!("packet {} ({})", reading.packet_id, reading.name);
    for (name, value) in &reading.fields {
        println!("  {name}\t{value}");
    }
    Ok(())
}

fn seconds_arg(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| anyhow::anyhow!("invalid duration '{seconds}': {e}"))
}

fn parse_hex_bytes(items: &[String]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(items.len());
    for s in items {
        let t = s.trim();
        if t.is_empty() {
            continue;
        }
        let no_prefix = t.strip_prefix("0x").unwrap_or(t);
        let b = u8::from_str_radix(no_prefix, 16)
            .map_err(|e| anyhow::anyhow!("invalid hex byte '{t}': {e}"))?;
        out.push(b);
    }
    Ok(out)
}
