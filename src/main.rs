//! `kubectl-oidc_login` binary.

// std
use std::process::ExitCode;
// crates.io
use clap::Parser;
use kube_oidc_login::cmd::{self, Cli};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	cmd::init_tracing(&cli.log_level);

	let cancel = CancellationToken::new();

	tokio::spawn(cancel_on_signal(cancel.clone()));

	match cmd::run(cli, cancel).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!("{e}");

			ExitCode::FAILURE
		},
	}
}

async fn cancel_on_signal(cancel: CancellationToken) {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{SignalKind, signal};

		match signal(SignalKind::terminate()) {
			Ok(mut terminate) => tokio::select! {
				_ = tokio::signal::ctrl_c() => (),
				_ = terminate.recv() => (),
			},
			Err(_) => {
				let _ = tokio::signal::ctrl_c().await;
			},
		}
	}
	#[cfg(not(unix))]
	{
		let _ = tokio::signal::ctrl_c().await;
	}

	tracing::warn!("Interrupted; cancelling.");
	cancel.cancel();
}
