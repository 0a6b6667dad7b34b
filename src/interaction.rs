//! Operator-facing side effects: launching a browser and reading from the terminal.
//!
//! Grant strategies only see the [`Browser`] and [`Prompt`] traits so tests can script both
//! without a desktop session or a TTY. Everything written for the operator goes to stderr,
//! since stdout carries the credential document consumed by `kubectl`.

// std
use std::{
	io::{BufRead, Write},
	process::{Command, Stdio},
};
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`Prompt`] implementations.
pub type PromptFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Opens URLs for the operator.
pub trait Browser
where
	Self: Send + Sync,
{
	/// Launches `url` without waiting for the browser to exit.
	fn open(&self, url: &Url) -> Result<()>;
}

/// Reads operator input.
pub trait Prompt
where
	Self: Send + Sync,
{
	/// Prints `prompt` and reads one line with echo enabled.
	fn read_line<'a>(&'a self, prompt: &'a str) -> PromptFuture<'a, String>;

	/// Prints `prompt` and reads one line with echo disabled.
	fn read_password<'a>(&'a self, prompt: &'a str) -> PromptFuture<'a, String>;
}

/// Launches the platform URL opener, or a configured command.
#[derive(Clone, Debug, Default)]
pub struct SystemBrowser {
	/// Replaces the platform opener; the URL is passed as the final argument.
	pub command: Option<String>,
}
impl SystemBrowser {
	fn command_for(&self, url: &Url) -> Command {
		if let Some(custom) = &self.command {
			let mut parts = custom.split_whitespace();
			let mut command = Command::new(parts.next().unwrap_or(custom));

			command.args(parts).arg(url.as_str());

			return command;
		}

		#[cfg(target_os = "macos")]
		{
			let mut command = Command::new("open");

			command.arg(url.as_str());

			command
		}
		#[cfg(target_os = "windows")]
		{
			let mut command = Command::new("cmd");

			command.args(["/C", "start", ""]).arg(url.as_str());

			command
		}
		#[cfg(not(any(target_os = "macos", target_os = "windows")))]
		{
			let mut command = Command::new("xdg-open");

			command.arg(url.as_str());

			command
		}
	}
}
impl Browser for SystemBrowser {
	fn open(&self, url: &Url) -> Result<()> {
		self.command_for(url)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.spawn()
			.map_err(TransportError::from)?;

		Ok(())
	}
}

/// Reads from the process stdin, prompting on stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalPrompt;
impl Prompt for TerminalPrompt {
	fn read_line<'a>(&'a self, prompt: &'a str) -> PromptFuture<'a, String> {
		let prompt = prompt.to_owned();

		Box::pin(async move { blocking(move || read_terminal_line(&prompt, true)).await })
	}

	fn read_password<'a>(&'a self, prompt: &'a str) -> PromptFuture<'a, String> {
		let prompt = prompt.to_owned();

		Box::pin(async move { blocking(move || read_terminal_line(&prompt, false)).await })
	}
}

async fn blocking<F>(f: F) -> Result<String>
where
	F: 'static + Send + FnOnce() -> std::io::Result<String>,
{
	let line = tokio::task::spawn_blocking(f)
		.await
		.map_err(|e| TransportError::Io(std::io::Error::other(e)))?
		.map_err(TransportError::from)?;

	Ok(line)
}

fn read_terminal_line(prompt: &str, echo: bool) -> std::io::Result<String> {
	let mut stderr = std::io::stderr();

	write!(stderr, "{prompt}")?;
	stderr.flush()?;

	let mut line = String::new();

	if echo {
		std::io::stdin().lock().read_line(&mut line)?;
	} else {
		read_without_echo(&mut line)?;
		writeln!(stderr)?;
	}

	Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

#[cfg(unix)]
fn read_without_echo(line: &mut String) -> std::io::Result<()> {
	// crates.io
	use rustix::termios::{self, LocalModes, OptionalActions};

	let stdin = std::io::stdin();
	let original = match termios::tcgetattr(&stdin) {
		Ok(original) => original,
		// Not a terminal; nothing to hide.
		Err(_) => {
			stdin.lock().read_line(line)?;

			return Ok(());
		},
	};
	let mut silent = original.clone();

	silent.local_modes.remove(LocalModes::ECHO);
	termios::tcsetattr(&stdin, OptionalActions::Now, &silent)?;

	let read = stdin.lock().read_line(line);

	termios::tcsetattr(&stdin, OptionalActions::Now, &original)?;
	read?;

	Ok(())
}

#[cfg(not(unix))]
fn read_without_echo(line: &mut String) -> std::io::Result<()> {
	std::io::stdin().lock().read_line(line)?;

	Ok(())
}
