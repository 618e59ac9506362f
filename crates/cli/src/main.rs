use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use analogtv::{
    AnalogTvSettings,
    settings::{SettingKind, SettingValue, setting_descriptors},
};
use clap::{
    Arg, ArgAction, ArgMatches,
    builder::{PathBufValueParser, PossibleValuesParser},
    command,
};
use color_eyre::eyre::{Report, Result, WrapErr};
use console::{Term, style};
use image::DynamicImage;
use log::debug;

macro_rules! warn {
    ($dst:expr, $($arg:tt)*) => {
        writeln!(
            $dst,
            "{}",
            style(format!($($arg)*)).yellow()
        )
    }
}

/// Command-line flag for a preset key: `phase_noise` becomes `--phase-noise`.
fn flag_name(key: &str) -> String {
    key.replace('_', "-")
}

fn option_name(label: &str) -> String {
    label.to_ascii_lowercase()
}

/// One flag per effect setting, generated from the setting descriptors so the CLI never drifts from the preset format.
fn setting_args() -> Vec<Arg> {
    setting_descriptors()
        .iter()
        .map(|descriptor| {
            let arg = Arg::new(descriptor.id.name())
                .long(flag_name(descriptor.id.name()))
                .help_heading("Effect settings");
            let arg = match descriptor.description {
                Some(description) => arg.help(description),
                None => arg.help(descriptor.label),
            };
            match &descriptor.kind {
                SettingKind::Enumeration { options } => arg.value_parser(PossibleValuesParser::new(
                    options.iter().map(|option| option_name(option.label)),
                )),
                SettingKind::FloatRange { range } => arg
                    .value_parser(clap::value_parser!(f64))
                    .allow_negative_numbers(*range.start() < 0.0),
                SettingKind::Boolean => arg.value_parser(clap::value_parser!(bool)),
            }
        })
        .collect()
}

/// Apply any setting flags given on the command line on top of `settings`.
fn apply_setting_overrides(
    settings: &mut AnalogTvSettings,
    matches: &ArgMatches,
    term: &mut Term,
) -> Result<()> {
    for descriptor in setting_descriptors() {
        let key = descriptor.id.name();
        let value = match &descriptor.kind {
            SettingKind::Enumeration { options } => {
                let Some(choice) = matches.get_one::<String>(key) else {
                    continue;
                };
                let index = options
                    .iter()
                    .find(|option| option_name(option.label) == *choice)
                    .map(|option| option.index)
                    .ok_or_else(|| Report::msg(format!("Unknown {key}: {choice}")))?;
                SettingValue::Enumeration(index)
            }
            SettingKind::FloatRange { range } => {
                let Some(&n) = matches.get_one::<f64>(key) else {
                    continue;
                };
                if !range.contains(&n) {
                    warn!(
                        term,
                        "Warning: --{} {n} is outside {}..={} and will be clamped",
                        flag_name(key),
                        range.start(),
                        range.end()
                    )?;
                }
                SettingValue::Float(n)
            }
            SettingKind::Boolean => {
                let Some(&b) = matches.get_one::<bool>(key) else {
                    continue;
                };
                SettingValue::Boolean(b)
            }
        };
        settings
            .set_field(descriptor.id, value)
            .wrap_err_with(|| format!("Invalid value for --{}", flag_name(key)))?;
    }
    Ok(())
}

/// Ask before clobbering an existing file. Returns whether to go ahead.
fn confirm_overwrite(term: &mut Term, output_path: &Path) -> Result<bool> {
    if !term.is_term() {
        return Ok(false);
    }
    loop {
        write!(
            term,
            "{} already exists. Overwrite? [y/N] ",
            output_path.as_os_str().to_string_lossy()
        )?;
        term.flush()?;
        let mut response = String::new();
        io::stdin().read_line(&mut response)?;
        response.make_ascii_lowercase();
        match response.trim() {
            "y" | "yes" => return Ok(true),
            "" | "n" | "no" => return Ok(false),
            _ => {}
        }
    }
}

pub fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let command = command!()
        .name("analogtv")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_parser(PathBufValueParser::new())
                .help("Path to the input image.")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(PathBufValueParser::new())
                .help("Path to write the processed image to. PNG and JPEG are supported.")
                .required(true),
        )
        .arg(
            Arg::new("overwrite")
                .short('y')
                .long("overwrite")
                .action(ArgAction::SetTrue)
                .help("If the output file already exists, overwrite it without prompting."),
        )
        .arg(
            Arg::new("settings-path")
                .short('p')
                .long("settings-path")
                .value_parser(PathBufValueParser::new())
                .help("Path to a JSON effect settings preset.")
                .long_help(
                    "Path to a JSON effect settings preset. Any effect settings given as flags \
                     override the preset's values.",
                ),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .value_parser(clap::value_parser!(u64))
                .help("Seed for the noise and jitter. A random one is used if not given."),
        )
        .arg(
            Arg::new("print-settings")
                .long("print-settings")
                .action(ArgAction::SetTrue)
                .help("Print the effective settings as a JSON preset before rendering."),
        )
        .args(setting_args());

    let matches = command.get_matches();
    let mut term = Term::buffered_stdout();

    let mut settings = match matches.get_one::<PathBuf>("settings-path") {
        Some(settings_path) => AnalogTvSettings::from_json(
            std::str::from_utf8(&fs::read(settings_path).wrap_err("Failed to open settings file")?)
                .wrap_err("Settings file is not valid UTF-8")?,
        )
        .wrap_err("Failed to parse settings file")?,
        None => AnalogTvSettings::default(),
    };
    apply_setting_overrides(&mut settings, &matches, &mut term)?;

    let input_path = matches
        .get_one::<PathBuf>("input")
        .ok_or_else(|| Report::msg("No input path"))?;
    let output_path = matches
        .get_one::<PathBuf>("output")
        .ok_or_else(|| Report::msg("No output path"))?;
    let seed = matches
        .get_one::<u64>("seed")
        .copied()
        .unwrap_or_else(rand::random);

    if matches.get_flag("print-settings") {
        writeln!(term, "{}", settings.to_json_string()?)?;
    }

    if output_path.is_dir() {
        return Err(Report::msg(format!(
            "Output path {} is a folder",
            output_path.as_os_str().to_string_lossy()
        )));
    }
    if output_path.exists() && !matches.get_flag("overwrite") && !confirm_overwrite(&mut term, output_path)? {
        term.write_line("Not overwriting existing file. Exiting.")?;
        term.flush()?;
        return Ok(());
    }

    let input = image::open(input_path)
        .wrap_err_with(|| format!("Failed to open {}", input_path.as_os_str().to_string_lossy()))?
        .to_rgba8();
    debug!("Loaded {}x{} input, seed {seed}", input.width(), input.height());

    let start_time = Instant::now();
    let output = settings
        .apply_effect(&input, seed)
        .wrap_err("Failed to apply effect")?;

    // The decoder always produces opaque pixels, and JPEG has no alpha channel.
    DynamicImage::ImageRgba8(output)
        .to_rgb8()
        .save(output_path)
        .wrap_err_with(|| format!("Failed to write {}", output_path.as_os_str().to_string_lossy()))?;

    writeln!(
        term,
        "Finished rendering in {:.2} second(s) to {}",
        start_time.elapsed().as_secs_f64(),
        output_path.as_os_str().to_string_lossy()
    )?;
    term.flush()?;

    Ok(())
}
