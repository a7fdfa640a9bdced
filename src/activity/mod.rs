//! Activity (a, b) estimation through the external Bayesian solver.
//!
//! - file protocol: zone file encoding and result file decoding (`protocol`)
//! - process execution behind the `ProcessRunner` trait (`runner`)
//! - representative-sample policy (`selection`)
//! - the request driver tying them together (`estimator`)

pub mod estimator;
pub mod protocol;
pub mod runner;
pub mod selection;

pub use estimator::*;
pub use protocol::{ZONE_FILE, parse_result_file, parse_zone_file, result_file_name, write_zone_file};
pub use runner::*;
pub use selection::*;

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::path::Path;

    use super::protocol::result_file_name;
    use super::runner::ProcessRunner;
    use crate::domain::{LonLat, Zone};
    use crate::error::AppError;

    /// Runner that records its call and writes a canned result file.
    #[derive(Debug, Default)]
    pub struct FakeRunner {
        output: Option<String>,
        code: i32,
        args: RefCell<Vec<String>>,
        zone_file: RefCell<Option<String>>,
    }

    impl FakeRunner {
        pub fn with_output(text: &str) -> Self {
            Self {
                output: Some(text.to_string()),
                ..Self::default()
            }
        }

        /// Produces no result file.
        pub fn silent() -> Self {
            Self::default()
        }

        pub fn exit_code(mut self, code: i32) -> Self {
            self.code = code;
            self
        }

        pub fn args(&self) -> Vec<String> {
            self.args.borrow().clone()
        }

        pub fn zone_file(&self) -> Option<String> {
            self.zone_file.borrow().clone()
        }
    }

    impl ProcessRunner for FakeRunner {
        fn run(&self, program: &Path, args: &[&str], cwd: &Path) -> Result<i32, AppError> {
            assert!(program.starts_with(cwd), "solver must run from the working directory");
            *self.args.borrow_mut() = args.iter().map(|s| s.to_string()).collect();
            if let Some(first) = args.first() {
                *self.zone_file.borrow_mut() = std::fs::read_to_string(cwd.join(first)).ok();
                if let Some(text) = &self.output {
                    std::fs::write(cwd.join(result_file_name(first)), text)
                        .map_err(|e| AppError::io(cwd, e))?;
                }
            }
            Ok(self.code)
        }
    }

    /// Placeholder solver file; the fake runner never executes it.
    pub fn fake_solver() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "#!/bin/sh\nexit 0\n").unwrap();
        file
    }

    pub fn square_zone(id: &str, lon0: f64, lat0: f64, size: f64) -> Zone {
        Zone {
            id: id.to_string(),
            vertices: vec![
                LonLat::new(lon0, lat0),
                LonLat::new(lon0 + size, lat0),
                LonLat::new(lon0 + size, lat0 + size),
                LonLat::new(lon0, lat0 + size),
            ],
            mmax: 7.0,
            completeness: vec![],
            priors: None,
            area_km2: None,
            background: None,
        }
    }
}
