use std::process::ExitCode;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;

use crazycity_launcher_lib::core::auth::{DeviceCodePrompt, MicrosoftProviderFactory};
use crazycity_launcher_lib::core::error::{LauncherError, LauncherResult};
use crazycity_launcher_lib::core::instance::InstanceRegistry;
use crazycity_launcher_lib::core::launch::{
    AccountSelector, CommandBootstrap, EventSink, LaunchEvent,
};
use crazycity_launcher_lib::core::state::{AppState, LauncherPaths};

const USAGE_TEXT: &str = "\
Usage: crazycity-launcher <command>

Commands:
  launch [instance] [username]   Offline launch (default instance, player \"Joueur\")
  launch-microsoft [instance]    Launch with the stored Microsoft account
  login                          Sign in with a Microsoft account (device code)
  logout                         Forget the account and its token cache
  profile                        Show the signed-in account
  instances                      List the configured instances
  settings [json-patch]          Show settings, or merge a JSON patch into them

Launch events are printed on stdout as JSON lines.";

#[tokio::main]
async fn main() -> ExitCode {
    crazycity_launcher_lib::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|arg| arg == "--help") {
        println!("{}", USAGE_TEXT);
        return ExitCode::SUCCESS;
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[crazycity] {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> LauncherResult<()> {
    let state = AppState::new(
        LauncherPaths::from_env()?,
        InstanceRegistry::builtin(),
        Arc::new(MicrosoftProviderFactory),
        Arc::new(|prompt: DeviceCodePrompt| {
            eprintln!("[crazycity] {}", prompt.message);
            eprintln!(
                "[crazycity] {} -> {}",
                prompt.verification_uri, prompt.user_code
            );
        }),
        Arc::new(CommandBootstrap::from_env()),
    )?;
    let arg = |i: usize| args.get(i).map(String::as_str);

    match arg(0) {
        Some("launch") => {
            let selector = AccountSelector::offline(arg(2).unwrap_or_default());
            launch(&state, arg(1), selector).await
        }
        Some("launch-microsoft") => launch(&state, arg(1), AccountSelector::Microsoft).await,
        Some("login") => print_json(&state.auth().login().await?),
        Some("logout") => {
            state.auth().logout().await;
            Ok(())
        }
        Some("profile") => print_json(&state.auth().get_profile().await),
        Some("instances") => print_json(&state.registry().list()),
        Some("settings") => match arg(1) {
            Some(raw) => {
                let patch: serde_json::Value = serde_json::from_str(raw)?;
                print_json(&state.settings().try_save(&patch)?)
            }
            None => print_json(&state.settings().load()),
        },
        Some(other) => Err(LauncherError::Configuration(format!(
            "commande inconnue '{other}', voir --help"
        ))),
        None => Ok(()),
    }
}

async fn launch(
    state: &AppState,
    instance: Option<&str>,
    selector: AccountSelector,
) -> LauncherResult<()> {
    let (sink, rx) = EventSink::channel();
    let launcher = state.launcher.clone();

    let run = async move {
        let result = launcher.launch(instance, selector, &sink).await;
        drop(sink);
        result
    };
    let (result, ()) = tokio::join!(run, print_events(rx));
    result
}

async fn print_events(mut rx: UnboundedReceiver<LaunchEvent>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("[crazycity] cannot encode event: {}", e),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> LauncherResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
