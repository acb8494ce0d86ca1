//! I/O modules for discovering, reading and writing swath and grid data

pub mod discovery;
pub mod swath_reader;
pub mod writer;
pub mod plot;

pub use discovery::{discover_files, discover_pairs, pair_files, parse_granule_id, ProductPattern};
pub use swath_reader::{find_subdataset, GdalSwathReader};
pub use writer::{read_fraction_grid, write_fraction_grid};
pub use plot::{render_fraction_map, PlotStyle};
