pub mod change;
pub mod isoform;
pub mod mutation;
pub mod position;
pub mod table;

// re-export for cleaner imports
pub use self::change::{ChangeDescriptor, Insertion};
pub use self::isoform::MutatedIsoform;
pub use self::mutation::GenomicMutationId;
pub use self::position::{Chromosome, GenomicPosition};
pub use self::table::{DerivedTable, Multiplicity, TableSchema};
