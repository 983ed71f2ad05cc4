// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, PasswordDisplayMode};
use komp_keys::{
    Client, ConnectOptions, CredentialProvider, Error, Image, Outcome, Settings,
    StaticCredentials, Summary, Target, TargetKind, annotate_images, open_session,
    resolve_images, with_session,
};
use log::debug;
use std::io::IsTerminal as _;

/// Attach the KOMP eye key-value templates to every image below a Project,
/// Dataset or Image.
///
/// Options not given on the command line or in the environment fall back to
/// the settings file, then to the built-in defaults.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Object type the target names: Project, Dataset or Image
    target_type: TargetKind,

    /// Name of the Project, Dataset or Image
    target: String,

    /// User that will own the annotations [default: mpk]
    #[clap(long, env = "OMERO_USER")]
    user: Option<String>,

    /// Group the target lives in [default: KOMP_eye]
    #[clap(long, env = "OMERO_GROUP")]
    groupid: Option<String>,

    /// Administrator account to log in with, acting on behalf of --user
    #[clap(long, env = "OMERO_SUDO")]
    sudo: Option<String>,

    /// JSON-RPC gateway host or URL [default: bhomero01lp.jax.org]
    #[clap(long, env = "OMERO_SERVER")]
    server: Option<String>,

    /// JSON-RPC gateway port [default: 4064]
    #[clap(long, env = "OMERO_PORT")]
    port: Option<u16>,

    /// Password for the login account, prompted for when absent
    #[clap(long, env = "OMERO_PASSWORD", hide = true, hide_env_values = true)]
    password: Option<String>,
}

/// Asks for the password on the terminal.
struct PasswordPrompt;

impl CredentialProvider for PasswordPrompt {
    fn password(&self, principal: &str) -> Result<String, Error> {
        Password::new(&format!("Password for {}", principal))
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()
            .map_err(|e| Error::CredentialError(e.to_string()))
    }
}

fn connect_options(args: &Args, settings: &Settings) -> ConnectOptions {
    let options = ConnectOptions::new(
        args.user.clone().unwrap_or_else(|| settings.user.clone()),
        args.groupid.clone().unwrap_or_else(|| settings.group.clone()),
    )
    .with_ttl(settings.sudo_ttl());

    match args.sudo.as_ref().or(settings.sudo.as_ref()) {
        Some(sudo) => options.with_sudo(sudo.as_str()),
        None => options,
    }
}

fn progress_bar() -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise} ETA: {eta}] {msg}: {wide_bar:.yellow} {human_pos}/{human_len}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▇▆▅▄▃▂▁  "),
    );
    bar
}

fn print_notice(bar: &ProgressBar, image: &Image, outcome: &Outcome) {
    match outcome {
        Outcome::AlreadyAnnotated => {
            bar.suspend(|| println!("Keys already created for image {}", image.name()))
        }
        Outcome::Applied { .. } => bar.suspend(|| println!("linking to image {}", image.name())),
        Outcome::Unmatched => {}
    }
}

async fn handle_annotate(
    client: &Client,
    credentials: &dyn CredentialProvider,
    options: &ConnectOptions,
    target: &Target,
) -> Result<Summary, Error> {
    let session = open_session(client, credentials, options).await?;
    let bar = progress_bar();
    bar.set_message(target.name().to_string());

    let result = with_session(client, session, async |session| {
        let images = resolve_images(client, session, target).await?;
        bar.set_length(images.len() as u64);
        annotate_images(client, session, &images, |image, outcome| {
            print_notice(&bar, image, outcome);
            bar.inc(1);
        })
        .await
    })
    .await;

    bar.finish_and_clear();
    result
}

#[cfg(feature = "profiling")]
fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Also installs the `log` bridge, so env_logger is not initialised here
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(fmt::format::FmtSpan::CLOSE),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[cfg(not(feature = "profiling"))]
fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    init_logging();

    let args = Args::parse();
    let settings = Settings::load()?;
    let options = connect_options(&args, &settings);
    let server = args.server.clone().unwrap_or_else(|| settings.server.clone());
    let port = args.port.unwrap_or(settings.port);
    debug!("Connecting to {}:{} as {}", server, port, options.user);

    let client = Client::with_timeout(&server, port, settings.timeout())?;
    let credentials: Box<dyn CredentialProvider> = match &args.password {
        Some(password) => Box::new(StaticCredentials::new(password.as_str())),
        None => Box::new(PasswordPrompt),
    };

    let target = Target::new(args.target_type, args.target);
    let summary = handle_annotate(&client, credentials.as_ref(), &options, &target).await?;
    debug!("{}", summary);

    Ok(())
}
