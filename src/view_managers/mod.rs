pub mod config_manager;
pub mod practice_manager;
pub mod results_manager;

pub(crate) use config_manager::ConfigManager;
pub(crate) use practice_manager::PracticeManager;
pub(crate) use results_manager::ResultsManager;
