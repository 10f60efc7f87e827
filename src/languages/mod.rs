//! Language-specific program preparers

mod cpp;
mod python;

pub use cpp::CppPreparer;
pub use python::PythonPreparer;

use crate::executor::ProgramPreparer;
use crate::types::Language;

/// The preparer registry: one concrete implementation per supported
/// language.
pub fn preparer_for(language: Language) -> Box<dyn ProgramPreparer> {
    match language {
        Language::Python => Box::new(PythonPreparer::new(None)),
        Language::Cpp => Box::new(CppPreparer::new(None, None)),
    }
}
