// Biblioteca do serviço de relatórios de telefonia
// Expõe módulos para uso em testes e binários

pub mod config;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

// AppState é definido aqui para ser compartilhado
pub struct AppState {
    pub settings: config::Settings,
    pub store: store::ReportStore,
    pub spool: services::CallsSpool,
}
