pub mod assembler;
pub mod disk;
pub mod dust;
pub mod fields;
pub mod parameters;
pub mod physical;

pub use assembler::{DustLibrary, FieldBuilder, assemble_model, load_dust, spherical_grid};
pub use disk::{
    ComponentDust, DiskComponent, DiskType, DustChoice, EnvelopeComponent, EnvelopeType,
    SettledDust, envelope_component, select_disk_model,
};
pub use dust::{DustCatalog, JsonDustLibrary};
pub use fields::PowerLawFields;
pub use parameters::{
    DiskParameters, FreeParameters, GapWindow, ParameterRecord, ParameterSchema, ParameterSpec,
    ParameterValue, ResolvedParameters, resolve_parameters,
};
pub use physical::{DustLayer, PhysicalModel};
