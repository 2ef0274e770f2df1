use std::collections::HashMap;
use std::sync::Arc;

use instance_defs::{
    AutoScalingClient, ContainerClient, InfraMappingType, LambdaClient, PcfClient, SyncError,
};

use super::handler::InstanceHandler;
use crate::handlers::{
    AwsAmiInstanceHandler, AwsLambdaInstanceHandler, ContainerInstanceHandler, PcfInstanceHandler,
};

#[derive(Clone)]
pub struct ProviderClients {
    pub auto_scaling: Arc<dyn AutoScalingClient>,
    pub containers: Arc<dyn ContainerClient>,
    pub pcf: Arc<dyn PcfClient>,
    pub lambda: Arc<dyn LambdaClient>,
}

/// Registry from infra mapping type to the handler that owns it.
#[derive(Clone, Default)]
pub struct InstanceHandlerFactory {
    handlers: HashMap<InfraMappingType, Arc<dyn InstanceHandler>>,
}

impl InstanceHandlerFactory {
    pub fn new(clients: ProviderClients) -> Self {
        let mut factory = InstanceHandlerFactory::default();
        factory.register(Arc::new(AwsAmiInstanceHandler::new(clients.auto_scaling)));
        factory.register(Arc::new(ContainerInstanceHandler::new(clients.containers)));
        factory.register(Arc::new(PcfInstanceHandler::new(clients.pcf)));
        factory.register(Arc::new(AwsLambdaInstanceHandler::new(clients.lambda)));
        factory
    }

    pub fn register(&mut self, handler: Arc<dyn InstanceHandler>) {
        for infra_mapping_type in handler.supported_infra_mapping_types() {
            self.handlers.insert(*infra_mapping_type, handler.clone());
        }
    }

    pub fn get_instance_handler(
        &self,
        infra_mapping_type: InfraMappingType,
    ) -> Result<Arc<dyn InstanceHandler>, SyncError> {
        self.handlers
            .get(&infra_mapping_type)
            .cloned()
            .ok_or(SyncError::NoHandlerRegistered(infra_mapping_type))
    }

    pub fn supported_types(&self) -> Vec<InfraMappingType> {
        let mut types: Vec<InfraMappingType> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }
}
