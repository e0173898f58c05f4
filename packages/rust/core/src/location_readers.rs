//! The round-based pipeline driver.
//!
//! A read starts with one location item. Each round dispatches every queued
//! item concurrently and waits for all of them before the next round starts;
//! whatever the processors emit becomes the next round's queue. The run ends
//! when a round emits nothing, or after `max_depth` rounds, in which case a
//! single depth error is reported for the starting location.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, instrument, trace, warn};

use catalogloader_readers::{UrlReader, UrlReaders};
use catalogloader_shared::{
    AppConfig, CatalogError, DEFAULT_MAX_DEPTH, Entity, LocationEntity, LocationError,
    LocationSpec, ProcessorResult, ReadLocationResult, Result,
};

use crate::processors::{
    AnnotateLocationEntityProcessor, Claim, DefinitionAtLocationProcessor, EntityPolicyProcessor,
    FileReaderProcessor, LdapOrgReaderProcessor, LocationProcessor, LocationRefProcessor,
    LocationResolver, PlaceholderProcessor, StaticLocationProcessor, UrlReaderProcessor,
    YamlProcessor,
};
use crate::rules::CatalogRulesEnforcer;

/// What dispatching one item produced.
#[derive(Default)]
struct Dispatched {
    emitted: Vec<ProcessorResult>,
    entity: Option<LocationEntity>,
    error: Option<LocationError>,
}

/// Reads locations through an ordered processor chain.
pub struct LocationReaders {
    processors: Vec<Arc<dyn LocationProcessor>>,
    rules: CatalogRulesEnforcer,
    max_depth: usize,
}

impl LocationReaders {
    pub fn new(processors: Vec<Arc<dyn LocationProcessor>>, rules: CatalogRulesEnforcer) -> Self {
        Self {
            processors,
            rules,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The built-in chain, in precedence order.
    pub fn default_processors(
        config: &AppConfig,
        reader: Arc<dyn UrlReader>,
    ) -> Vec<Arc<dyn LocationProcessor>> {
        vec![
            Arc::new(StaticLocationProcessor::from_config(&config.catalog.locations)),
            Arc::new(FileReaderProcessor),
            Arc::new(LdapOrgReaderProcessor::new(
                config.catalog.processors.ldap_org.providers.clone(),
            )),
            Arc::new(UrlReaderProcessor::new(reader)),
            Arc::new(YamlProcessor),
            Arc::new(PlaceholderProcessor),
            Arc::new(DefinitionAtLocationProcessor),
            Arc::new(EntityPolicyProcessor),
            Arc::new(LocationRefProcessor),
            Arc::new(AnnotateLocationEntityProcessor),
        ]
    }

    /// Assemble the pipeline from configuration.
    ///
    /// This is the one place configuration errors surface; runs never fail.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let reader: Arc<dyn UrlReader> =
            Arc::new(UrlReaders::from_config(&config.integrations)?);
        debug!(%reader, "built URL readers");

        Ok(Self::new(
            Self::default_processors(config, reader),
            CatalogRulesEnforcer::from_config(&config.catalog),
        )
        .with_max_depth(config.catalog.max_depth))
    }

    /// Read `location` and everything it leads to.
    #[instrument(skip_all, fields(location = %location))]
    pub async fn read(&self, location: &LocationSpec) -> ReadLocationResult {
        let mut output = ReadLocationResult::default();
        let mut items = vec![ProcessorResult::location(location.clone(), false)];

        for depth in 0..self.max_depth {
            debug!(depth, items = items.len(), "starting round");
            let results = join_all(items.into_iter().map(|item| self.dispatch(item))).await;

            let mut next = Vec::new();
            for result in results {
                next.extend(result.emitted);
                output.entities.extend(result.entity);
                output.errors.extend(result.error);
            }

            if next.is_empty() {
                info!(
                    rounds = depth + 1,
                    entities = output.entities.len(),
                    errors = output.errors.len(),
                    "read complete"
                );
                return output;
            }
            items = next;
        }

        let error = CatalogError::DepthExceeded {
            max_depth: self.max_depth,
            location_type: location.location_type.clone(),
            target: location.target.clone(),
        };
        warn!(%error);
        output.errors.push(LocationError {
            location: location.clone(),
            error,
        });
        output
    }

    async fn dispatch(&self, item: ProcessorResult) -> Dispatched {
        trace!(kind = item.kind(), location = %item.source(), "dispatching item");
        match item {
            ProcessorResult::Location { location, optional } => Dispatched {
                emitted: self.handle_location(&location, optional).await,
                ..Default::default()
            },
            ProcessorResult::Data { location, data } => Dispatched {
                emitted: self.handle_data(&data, &location).await,
                ..Default::default()
            },
            ProcessorResult::Entity { location, entity } => {
                if !self.rules.is_allowed(&entity, &location) {
                    let error = CatalogError::NotAllowed {
                        kind: entity.kind.clone(),
                        location_type: location.location_type.clone(),
                        target: location.target.clone(),
                    };
                    debug!(entity = %entity.ref_string(), %error, "rejected by policy");
                    return Dispatched {
                        error: Some(LocationError { location, error }),
                        ..Default::default()
                    };
                }
                let (entity, emitted) = self.handle_entity(entity, &location).await;
                Dispatched {
                    emitted,
                    entity: Some(LocationEntity { entity, location }),
                    error: None,
                }
            }
            ProcessorResult::Error { location, error } => Dispatched {
                emitted: self.handle_error(&error, &location).await,
                error: Some(LocationError { location, error }),
                entity: None,
            },
        }
    }

    async fn handle_location(
        &self,
        location: &LocationSpec,
        optional: bool,
    ) -> Vec<ProcessorResult> {
        debug!(%location, optional, "reading location");

        let mut emitted = Vec::new();
        for processor in &self.processors {
            match processor.read_location(location, optional).await {
                Ok(Claim::Handled(items)) => {
                    emitted.extend(items);
                    return emitted;
                }
                Ok(Claim::Declined) => {}
                Err(e) => emitted.push(self.downgrade(
                    processor.as_ref(),
                    location,
                    format!("reading location {location}"),
                    e,
                )),
            }
        }

        let message = format!(
            "No processor was able to read location {} {}",
            location.location_type, location.target
        );
        warn!("{message}");
        emitted.push(ProcessorResult::error(
            location,
            CatalogError::UnhandledLocation(message),
        ));
        emitted
    }

    async fn handle_data(&self, data: &[u8], location: &LocationSpec) -> Vec<ProcessorResult> {
        debug!(%location, bytes = data.len(), "parsing data");

        let mut emitted = Vec::new();
        for processor in &self.processors {
            match processor.parse_data(data, location).await {
                Ok(Claim::Handled(items)) => {
                    emitted.extend(items);
                    return emitted;
                }
                Ok(Claim::Declined) => {}
                Err(e) => emitted.push(self.downgrade(
                    processor.as_ref(),
                    location,
                    format!("parsing {location}"),
                    e,
                )),
            }
        }

        let message = format!(
            "No processor was able to parse location {} {}",
            location.location_type, location.target
        );
        emitted.push(ProcessorResult::error(
            location,
            CatalogError::UnparseableData(message),
        ));
        emitted
    }

    /// Run every transform in order; a failed step leaves the entity as it was.
    async fn handle_entity(
        &self,
        entity: Entity,
        location: &LocationSpec,
    ) -> (Entity, Vec<ProcessorResult>) {
        debug!(%location, entity = %entity.ref_string(), "processing entity");

        let mut current = entity;
        let mut emitted = Vec::new();
        for processor in &self.processors {
            match processor.process_entity(&current, location, self).await {
                Ok(step) => {
                    if let Some(next) = step.entity {
                        current = next;
                    }
                    emitted.extend(step.emitted);
                }
                Err(e) => {
                    let action =
                        format!("processing entity {} at {location}", current.ref_string());
                    emitted.push(self.downgrade(processor.as_ref(), location, action, e));
                }
            }
        }
        (current, emitted)
    }

    /// First claim wins; the error itself is always surfaced by the caller.
    async fn handle_error(
        &self,
        error: &CatalogError,
        location: &LocationSpec,
    ) -> Vec<ProcessorResult> {
        debug!(%location, %error, "handling error");

        let mut emitted = Vec::new();
        for processor in &self.processors {
            match processor.handle_error(error, location).await {
                Ok(Claim::Handled(items)) => {
                    emitted.extend(items);
                    break;
                }
                Ok(Claim::Declined) => {}
                Err(e) => emitted.push(self.downgrade(
                    processor.as_ref(),
                    location,
                    format!("handling another error at {location}"),
                    e,
                )),
            }
        }
        emitted
    }

    fn downgrade(
        &self,
        processor: &dyn LocationProcessor,
        location: &LocationSpec,
        action: String,
        error: CatalogError,
    ) -> ProcessorResult {
        let message = format!(
            "Processor {} threw an error while {action}, {error}",
            processor.name()
        );
        warn!(processor = processor.name(), %location, %error, "{message}");
        ProcessorResult::error(location, CatalogError::Processor(message))
    }
}

#[async_trait]
impl LocationResolver for LocationReaders {
    /// Read one location out of band, following only emitted locations and
    /// bounded by its own round counter.
    async fn read_location(&self, location: &LocationSpec) -> Result<Vec<u8>> {
        let mut pending = vec![(location.clone(), false)];
        let mut data: Option<Vec<u8>> = None;
        let mut error: Option<CatalogError> = None;

        for _ in 0..self.max_depth {
            let mut next = Vec::new();
            for (current, optional) in &pending {
                for item in self.handle_location(current, *optional).await {
                    match item {
                        ProcessorResult::Error { error: e, .. } => {
                            if error.is_none() {
                                error = Some(e);
                            }
                        }
                        ProcessorResult::Data { data: bytes, .. } => {
                            if data.is_some() {
                                if error.is_none() {
                                    error = Some(CatalogError::Processor(
                                        "More than one piece of data loaded unexpectedly".into(),
                                    ));
                                }
                            } else {
                                data = Some(bytes);
                            }
                        }
                        ProcessorResult::Location { location, optional } => {
                            next.push((location, optional));
                        }
                        ProcessorResult::Entity { entity, .. } => {
                            debug!(entity = %entity.ref_string(), "ignoring entity from sub-read");
                        }
                    }
                }
            }

            if next.is_empty() {
                return match (error, data) {
                    (Some(e), _) => Err(e),
                    (None, Some(data)) => Ok(data),
                    (None, None) => Err(CatalogError::Processor("No data loaded".into())),
                };
            }
            pending = next;
        }

        Err(CatalogError::DepthExceeded {
            max_depth: self.max_depth,
            location_type: location.location_type.clone(),
            target: location.target.clone(),
        })
    }
}
