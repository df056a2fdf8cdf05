use std::sync::Arc;

use anyhow::Context;
use scrape_core::DashboardView;
use scrape_engine::{ClientSettings, PollSettings, PollingClient, ReqwestScrapeApi, TokioScheduler};
use scrape_logging::{level_from_env, scrape_info, scrape_warn, LogDestination};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use super::command::{Command, HELP};
use super::render::render;

pub async fn run_dashboard(urls: Vec<String>) -> anyhow::Result<()> {
    // The terminal belongs to the dashboard; logs go to the file only.
    scrape_logging::initialize(LogDestination::File, level_from_env());

    let client_settings = ClientSettings::from_env().context("reading client settings")?;
    let poll_settings = PollSettings::from_env().context("reading poll settings")?;
    let api = ReqwestScrapeApi::new(&client_settings).context("building API client")?;
    scrape_info!(
        "Dashboard talking to {} (poll every {:?}, totals over {} jobs)",
        api.base_url(),
        poll_settings.interval,
        poll_settings.policy
    );

    let client = Arc::new(PollingClient::new(
        Arc::new(api),
        Arc::new(TokioScheduler::current()),
        poll_settings,
    ));

    let renderer = tokio::spawn(render_loop(client.subscribe()));
    let runner = tokio::spawn({
        let client = client.clone();
        async move { client.run().await }
    });

    // Failures are recorded in the view and rendered from there.
    let _ = client.refresh().await;
    for url in urls {
        let _ = client.submit(&url).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                if !handle_command(&client, Command::parse(&line)).await {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                scrape_info!("Received Ctrl+C");
                break;
            }
        }
    }

    client.shutdown();
    if let Err(err) = runner.await {
        scrape_warn!("Polling task ended abnormally: {}", err);
    }
    renderer.abort();
    Ok(())
}

/// Returns `false` when the dashboard should exit.
async fn handle_command(client: &PollingClient, command: Command) -> bool {
    match command {
        Command::Submit(url) => {
            let _ = client.submit(&url).await;
        }
        Command::Refresh => {
            let _ = client.refresh().await;
        }
        Command::Policy(policy) => client.set_policy(policy),
        Command::Dismiss => client.dismiss_error(),
        Command::Help => println!("{HELP}"),
        Command::Invalid(message) => println!("{message}\n{HELP}"),
        Command::Empty => {}
        Command::Quit => return false,
    }
    true
}

async fn render_loop(mut views: watch::Receiver<DashboardView>) {
    let initial = views.borrow_and_update().clone();
    print_view(&initial);
    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();
        print_view(&view);
    }
}

fn print_view(view: &DashboardView) {
    println!("\n{}", render(view).trim_end());
}
