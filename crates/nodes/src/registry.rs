//! Maps a node's [`NodeCategory`] to the [`CategoryExecutor`] that runs it
//! (spec §4.1). The engine holds one `NodeRegistry` and dispatches every
//! node through it; a category with no registered executor is a
//! configuration bug, not a per-node failure, so it surfaces as `Fatal`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::{
    broker::BrokerExecutor,
    category::NodeCategory,
    communication::CommunicationExecutor,
    control_flow::ControlFlowExecutor,
    datasource::DataSourceExecutor,
    http::HttpExecutor,
    indicator::IndicatorExecutor,
    traits::{CategoryExecutor, ExecutionContext, NodeExecutionRequest},
    utility::UtilityExecutor,
    NodeError,
};

pub struct NodeRegistry {
    executors: HashMap<NodeCategory, Arc<dyn CategoryExecutor>>,
}

impl NodeRegistry {
    /// Wires up every built-in category executor.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut executors: HashMap<NodeCategory, Arc<dyn CategoryExecutor>> = HashMap::new();
        executors.insert(NodeCategory::ControlFlow, Arc::new(ControlFlowExecutor));
        executors.insert(NodeCategory::Indicator, Arc::new(IndicatorExecutor));
        executors.insert(NodeCategory::DataSource, Arc::new(DataSourceExecutor::new()));
        executors.insert(NodeCategory::Broker, Arc::new(BrokerExecutor::new()));
        executors.insert(NodeCategory::Communication, Arc::new(CommunicationExecutor));
        executors.insert(NodeCategory::Utility, Arc::new(UtilityExecutor::new()));
        executors.insert(NodeCategory::Http, Arc::new(HttpExecutor::new()));
        Self { executors }
    }

    /// Register or override the executor for a category — used by plugin
    /// node types (spec §4.1, "the category table is extensible").
    pub fn register(&mut self, category: NodeCategory, executor: Arc<dyn CategoryExecutor>) {
        self.executors.insert(category, executor);
    }

    pub async fn dispatch(
        &self,
        category: NodeCategory,
        request: &NodeExecutionRequest,
        ctx: &ExecutionContext,
    ) -> Result<Value, NodeError> {
        let executor = self
            .executors
            .get(&category)
            .ok_or_else(|| NodeError::Fatal(format!("no executor registered for category {category:?}")))?;
        executor.execute(request, ctx).await
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{NoopCredentialStore, NoopNotificationSink};
    use crate::traits::PersistentStateAccess;
    use serde_json::json;

    struct NoopState;
    #[async_trait::async_trait]
    impl PersistentStateAccess for NoopState {
        async fn get(&self, _key: &str) -> Option<Value> {
            None
        }
        async fn set(&self, _key: &str, _value: Value) -> Result<(), NodeError> {
            Ok(())
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            user_id: uuid::Uuid::new_v4(),
            workflow_id: uuid::Uuid::new_v4(),
            run_id: uuid::Uuid::new_v4(),
            state: Arc::new(NoopState),
            credentials: Arc::new(NoopCredentialStore),
            notifications: Arc::new(NoopNotificationSink),
        }
    }

    #[tokio::test]
    async fn dispatches_control_flow_to_if_node() {
        let registry = NodeRegistry::with_builtins();
        let request = NodeExecutionRequest {
            node_id: "n1".into(),
            node_type: "If".into(),
            resolved_values: json!({"conditions": [{"left": 1, "operator": "==", "right": 1}]}),
            input: Value::Null,
        };
        let result = registry.dispatch(NodeCategory::ControlFlow, &request, &ctx()).await.unwrap();
        assert_eq!(result, json!(true));
    }

    #[test]
    fn missing_category_is_fatal() {
        let registry = NodeRegistry { executors: HashMap::new() };
        let result = futures_lite_block_on(registry.dispatch(
            NodeCategory::Http,
            &NodeExecutionRequest {
                node_id: "n1".into(),
                node_type: "x".into(),
                resolved_values: Value::Null,
                input: Value::Null,
            },
            &ctx(),
        ));
        assert!(result.is_err());
    }

    fn futures_lite_block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(fut)
    }
}
