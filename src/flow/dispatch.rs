//! Request dispatcher: routes a request to the path its intent calls for
//!
//! Complex planning goes through the planning flow, single queries are one
//! run of the primary agent, and casual chat is one plain gateway call.
//! Every outcome, including failures, comes back as a `FlowResult`.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::planning::PlanningFlow;
use super::result::FlowResult;
use crate::agent::prompts::CASUAL_CHAT_SYSTEM_PROMPT;
use crate::config::{Config, DegradationPolicy};
use crate::core::Message;
use crate::gateway::LlmGateway;
use crate::router::{ClassificationSource, Intent, IntentRouter};
use crate::tools::ToolRegistry;

pub struct RequestDispatcher {
    router: IntentRouter,
    flow: PlanningFlow,
    gateway: Arc<LlmGateway>,
    degradation: DegradationPolicy,
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("flow", &self.flow)
            .field("degradation", &self.degradation)
            .finish_non_exhaustive()
    }
}

impl RequestDispatcher {
    pub fn new(
        router: IntentRouter,
        flow: PlanningFlow,
        gateway: Arc<LlmGateway>,
        degradation: DegradationPolicy,
    ) -> Self {
        RequestDispatcher {
            router,
            flow,
            gateway,
            degradation,
        }
    }

    /// Wire the router and a default-worker planning flow over one gateway
    pub fn from_config(
        config: &Config,
        gateway: Arc<LlmGateway>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let router = IntentRouter::new(gateway.clone(), &config.flow);
        let flow = PlanningFlow::with_default_workers(config, gateway.clone(), tools);
        Self::new(router, flow, gateway, config.flow.degradation)
    }

    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    pub fn flow(&self) -> &PlanningFlow {
        &self.flow
    }

    /// Cancel an in-flight planning run
    pub fn cancel(&self) {
        self.flow.cancel();
    }

    /// Handle one request. Never fails: errors become unsuccessful results.
    pub async fn handle(&self, request: &str) -> FlowResult {
        let started = Instant::now();
        let classification = self.router.classify(request).await;
        info!(intent = %classification.intent, source = %classification.source, "Request routed");

        let result = match classification.intent {
            Intent::ComplexPlanning => match self.flow.execute(request).await {
                Ok(result) => result,
                Err(e) => FlowResult::failure(e.to_string(), started.elapsed()),
            },
            Intent::SingleQuery => {
                let primary = self.flow.primary();
                match primary.run(request, &CancellationToken::new()).await {
                    Ok(output) => FlowResult::success(output, started.elapsed(), 1),
                    Err(e) => FlowResult::failure(e.to_string(), started.elapsed()),
                }
            }
            Intent::CasualChat => {
                let messages = [Message::system(CASUAL_CHAT_SYSTEM_PROMPT), Message::user(request)];
                match self.gateway.chat(&messages).await {
                    Ok(reply) => FlowResult::success(reply, started.elapsed(), 0),
                    Err(e) => FlowResult::failure(e.to_string(), started.elapsed()),
                }
            }
        };

        if !result.success {
            warn!(intent = %classification.intent, reason = %result.output, "Request failed");
        }

        let mut result = result
            .with_metadata("intent", classification.intent.as_str())
            .with_metadata("classification", classification.source.to_string());
        if let (ClassificationSource::Fallback(reason), DegradationPolicy::Surface) =
            (&classification.source, self.degradation)
        {
            let warning = format!("intent classification fell back to casual chat: {}", reason);
            result = result.with_warnings(&[warning]);
        }
        result
    }
}
