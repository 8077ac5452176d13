pub mod error;
pub mod payloads;
pub mod records;

pub use error::{ErrorPayload, RemoteDiagnostics};
pub use payloads::{
    Axis, ChartKind, ChartPayload, Dataset, FunnelPayload, FunnelStage, KpiPayload, ListPayload,
    PipelineColumn, PipelinePayload, RecordSummary, ScatterPoint, SeriesKind, TreemapLeaf, Trend,
};
pub use records::{DocStatus, Filter, FilterOperator, ListOptions, RemoteRecord};
