mod capabilities;
mod chains;
mod navigation;

use crate::command::context::CommandContext;
use crate::command::domain::{CommandAction, CommandOutcome};
use anyhow::Result;
use navigator_resolver::CancelSignal;
use serde_json::Value;

pub struct Services {
    capabilities: capabilities::CapabilitiesService,
    navigation: navigation::NavigationService,
    chains: chains::ChainService,
}

impl Services {
    pub fn new() -> Self {
        Self {
            capabilities: capabilities::CapabilitiesService,
            navigation: navigation::NavigationService,
            chains: chains::ChainService,
        }
    }

    pub async fn route(
        &self,
        action: CommandAction,
        payload: Value,
        ctx: &CommandContext,
        cancel: &CancelSignal,
    ) -> Result<CommandOutcome> {
        match action {
            CommandAction::Capabilities => self.capabilities.run(payload, ctx).await,
            CommandAction::ExplorePath => self.navigation.explore(payload, ctx, cancel).await,
            CommandAction::CheckExists => self.navigation.check_exists(payload, ctx, cancel).await,
            CommandAction::ListDirectory => self.navigation.list(payload, ctx, cancel).await,
            CommandAction::ReadFile => self.navigation.read_file(payload, ctx, cancel).await,
            CommandAction::Structure => self.navigation.structure(payload, ctx, cancel).await,
            CommandAction::FindFiles => self.navigation.find_files(payload, ctx, cancel).await,
            CommandAction::SearchCode => self.navigation.search_code(payload, ctx, cancel).await,
            CommandAction::TraceChain => self.chains.trace_chain(payload, ctx, cancel).await,
            CommandAction::TraceMethod => self.chains.trace_method(payload, ctx, cancel).await,
            CommandAction::MapDependencies => self.chains.map_dependencies(payload, ctx).await,
        }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new()
    }
}
