//! Explicit composition of the use cases from concrete collaborators.

// self
use crate::{
	_prelude::*,
	authentication::Authentication,
	clean::Clean,
	clock::{Clock, SystemClock},
	credential_plugin::GetToken,
	flows::Interaction,
	interaction::{SystemBrowser, TerminalPrompt},
	oidc::{OidcConnector, ReqwestConnector},
	setup::Setup,
	store::{Repository, TokenCacheRepository},
};

/// Collaborators every use case is built from.
#[derive(Clone)]
pub struct Dependencies {
	/// Provider discovery and wire operations.
	pub connector: Arc<dyn OidcConnector>,
	/// Token cache.
	pub repository: Arc<dyn TokenCacheRepository>,
	/// Browser and terminal access.
	pub interaction: Interaction,
	/// Time source.
	pub clock: Arc<dyn Clock>,
}
impl Dependencies {
	/// Production collaborators; `browser_command` overrides the platform URL opener.
	pub fn system(browser_command: Option<String>) -> Self {
		Self {
			connector: Arc::new(ReqwestConnector),
			repository: Arc::new(Repository::default()),
			interaction: Interaction {
				browser: Arc::new(SystemBrowser { command: browser_command }),
				prompt: Arc::new(TerminalPrompt),
			},
			clock: Arc::new(SystemClock),
		}
	}
}
impl Debug for Dependencies {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Dependencies(..)")
	}
}

/// Fully wired use cases.
#[derive(Clone, Debug)]
pub struct App {
	/// Orchestrator shared by the use cases below.
	pub authentication: Authentication,
	/// `get-token`.
	pub get_token: GetToken,
	/// `setup`.
	pub setup: Setup,
	/// `clean`.
	pub clean: Clean,
}

/// Wires every use case from `deps`.
pub fn assemble(deps: Dependencies) -> App {
	let Dependencies { connector, repository, interaction, clock } = deps;
	let authentication = Authentication::new(connector, repository.clone(), interaction, clock);

	App {
		get_token: GetToken::new(authentication.clone()),
		setup: Setup::new(authentication.clone()),
		clean: Clean::new(repository),
		authentication,
	}
}
