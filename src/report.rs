//! CSV report channels for recording model-level data from a run.
//!
//! A report is a serializable row struct registered with
//! [`create_report_trait!`](crate::create_report_trait) and
//! [`add_report`](ContextReportExt::add_report); rows are appended with
//! [`send_report`](ContextReportExt::send_report) and flushed as they arrive.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{create_dir_all, File, OpenOptions};
use std::path::PathBuf;

use csv::Writer;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::MiasmaError;

pub trait Report: 'static {
    // Returns report type
    fn type_id(&self) -> TypeId;
    // Serializes the data with the correct writer
    fn serialize(&self, writer: &mut Writer<File>);
}

/// Use this macro to define a unique report type
#[macro_export]
macro_rules! create_report_trait {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(&self, writer: &mut csv::Writer<std::fs::File>) {
                writer.serialize(self).unwrap();
            }
        }
    };
}
pub use create_report_trait;

/// Customizable filename options supplied before reports are added.
pub struct ConfigReportOptions {
    /// Prefix prepended to every report file name.
    pub file_prefix: String,
    /// Directory the report files are written to.
    pub directory: PathBuf,
    /// Whether an existing report file may be overwritten.
    pub overwrite: bool,
}

impl ConfigReportOptions {
    fn new() -> Self {
        // Defaults to the current directory, no prefix, no overwriting
        ConfigReportOptions {
            file_prefix: String::new(),
            directory: std::env::current_dir().expect("Failed to get current directory"),
            overwrite: false,
        }
    }

    /// Sets the prefix prepended to report file names.
    pub fn file_prefix(&mut self, file_prefix: String) -> &mut ConfigReportOptions {
        self.file_prefix = file_prefix;
        self
    }

    /// Sets the directory report files are written to.
    pub fn directory(&mut self, directory: PathBuf) -> &mut ConfigReportOptions {
        self.directory = directory;
        self
    }

    /// Allows or forbids overwriting existing report files. Not recommended
    /// for production runs.
    pub fn overwrite(&mut self, overwrite: bool) -> &mut ConfigReportOptions {
        self.overwrite = overwrite;
        self
    }
}

struct ReportData {
    file_writers: RefCell<HashMap<TypeId, Writer<File>>>,
    config: ConfigReportOptions,
}

// Registers a data container that stores
// * file_writers: Maps report type to file writer
// * config: The filename options the user supplies
define_data_plugin!(
    ReportPlugin,
    ReportData,
    ReportData {
        file_writers: RefCell::new(HashMap::new()),
        config: ConfigReportOptions::new(),
    }
);

pub trait ContextReportExt {
    /// Returns the report configuration for this run; set options before
    /// calling `add_report`.
    fn report_options(&mut self) -> &mut ConfigReportOptions;

    /// Registers a report type, creating `<directory>/<prefix><short_name>.csv`.
    ///
    /// # Errors
    ///
    /// Returns a `MiasmaError` if the file exists and overwriting was not
    /// enabled, or if the file cannot be created.
    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), MiasmaError>;

    /// Writes a new row to the report file associated with the report type.
    fn send_report<T: Report>(&self, report: T);
}

impl ContextReportExt for Context {
    fn report_options(&mut self) -> &mut ConfigReportOptions {
        let data_container = self.get_data_container_mut::<ReportPlugin>();
        &mut data_container.config
    }

    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), MiasmaError> {
        let data_container = self.get_data_container_mut::<ReportPlugin>();
        let config = &data_container.config;

        let path = config
            .directory
            .join(format!("{}{short_name}.csv", config.file_prefix));
        create_dir_all(&path.parent().expect("Invalid report path"))?;
        let created_file = match OpenOptions::new()
            .write(true)
            .create_new(!config.overwrite)
            .create(config.overwrite)
            .truncate(config.overwrite)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(MiasmaError::ReportError(format!(
                    "File already exists: {}. Please rename the report or set overwrite to true.",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let writer = Writer::from_writer(created_file);
        let mut file_writers = data_container.file_writers.borrow_mut();
        file_writers.insert(TypeId::of::<T>(), writer);
        Ok(())
    }

    fn send_report<T: Report>(&self, report: T) {
        // No data container will exist if no reports have been added
        let data_container = self
            .get_data_container::<ReportPlugin>()
            .expect("No writer found for the report type");
        let mut writer_cell = data_container.file_writers.try_borrow_mut().unwrap();
        let writer = writer_cell
            .get_mut(&report.type_id())
            .expect("No writer found for the report type");
        report.serialize(writer);
        writer.flush().expect("Failed to flush writer");
    }
}
