//! Dockerfile parsing and fact extraction.
//!
//! The pipeline is: discover build files (`select`), split each into logical
//! instructions (`tokenize`), fold them into a [`BuildFileModel`] (`model`,
//! using `assign` for ENV/LABEL), then query the model with the functions in
//! `facts`. Models are read-only once built and safe to share across threads.

mod assign;
mod facts;
mod model;
mod select;
mod tokenize;

pub use assign::{parse_assignments, strip_quotes};
pub use facts::{
    assignments_of, base_image_refs, detect_curl_pipe_sh, detect_wget_pipe_sh,
    exposed_port_lines, exposed_ports, external_base_images, extract_package_installs,
    final_user, find_commands, has_healthcheck, instructions_of, Assignment, FactSheet, ImageRef,
    PackageInstall, PackageManager,
};
pub use model::{
    load_build_files, load_path, with_jobs, BuildFileModel, LoadOptions, ParseError,
};
pub use select::{discover, is_build_file_name, BuildFileTarget};
pub use tokenize::{tokenize, Instruction};
