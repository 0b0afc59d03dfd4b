//! Helmible Core - chart loading and values inspection
//!
//! The exporter's view of a Helm chart: `Chart.yaml` metadata, the values
//! document (raw and parsed), and the list of source templates. The
//! [`Inspector`] answers the two questions the template emitter asks while
//! walking an AST: *is this dotted path bound to a boolean?* and *which
//! member names live under this path?*

pub mod chart;
pub mod keys;
pub mod values;

pub use chart::{ChartError, ChartMetadata, HelmChart};
pub use keys::{snake_case_renames, to_snake};
pub use values::{InspectError, Inspector};
