mod aggregate;
mod config;
mod gini;
mod group_key;
mod long_table;
mod pivot;
mod trend;

pub use aggregate::{aggregate_view, generate_view_tables};
pub use config::{list_configs, load_systems, resolve_config, validate_config};
pub use group_key::GroupKey;
pub use long_table::build_long_table;
pub use pivot::to_table_data;
pub use trend::{PLOT_CACHE_TTL, plots};
