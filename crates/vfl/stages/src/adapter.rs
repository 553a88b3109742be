//! Common stage surface

use async_trait::async_trait;
use vfl_cluster::{Cluster, PartyRegistry, SecureUnit};
use vfl_types::{StageError, StageKind, StageSummary};

/// What every stage borrows from the live cluster
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub unit: &'a dyn SecureUnit,
    pub registry: &'a PartyRegistry,
}

impl<'a> StageContext<'a> {
    pub fn new(cluster: &'a Cluster) -> Self {
        Self {
            unit: cluster.unit(),
            registry: cluster.registry(),
        }
    }
}

/// A stage's output together with its revealed summary
#[derive(Debug)]
pub struct Staged<T> {
    pub output: T,
    pub summary: StageSummary,
}

impl<T> Staged<T> {
    pub fn new(output: T, summary: StageSummary) -> Self {
        Self { output, summary }
    }
}

/// One pipeline stage.
///
/// An adapter owns (or borrows) its inputs and is consumed by `run`. Any
/// intermediate handle it creates is released before `run` returns, on
/// both the success and the failure path.
#[async_trait]
pub trait StageAdapter: Send + Sized {
    const KIND: StageKind;

    type Output: Send;

    async fn run(self, ctx: &StageContext<'_>) -> Result<Staged<Self::Output>, StageError>;
}
