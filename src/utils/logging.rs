use tracing::{debug, error, info, warn};

pub fn log_request_received(endpoint: &str, method: &str) {
    info!("Request received: {} {}", method, endpoint);
}

pub fn log_request_processed(endpoint: &str, status: u16, duration_ms: u64) {
    info!("Request processed: {} - Status: {} - Duration: {}ms",
          endpoint, status, duration_ms);
}

pub fn log_month_consolidated(ym: &str, lojas: usize, recebidas: i64, perdidas: i64) {
    info!("Mês {} consolidado: {} lojas - recebidas: {} - perdidas: {}",
          ym, lojas, recebidas, perdidas);
}

pub fn log_upload_recorded(ym: &str, kind: &str, filename: &str) {
    info!("Upload registrado: {} [{}] - {}", ym, kind, filename);
}

pub fn log_volumes_applied(ym: &str, lojas: usize) {
    info!("Volumes aplicados e % de perda recalculada: {} ({} lojas)", ym, lojas);
}

pub fn log_ingest_error(file: &str, error: &str) {
    error!("Falha ao processar planilha: {} - Error: {}", file, error);
}

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_server_startup(port: u16) {
    info!("🚀 Relatório de telefonia server starting on port {}", port);
}

pub fn log_server_ready(port: u16) {
    info!("✅ Server ready and listening on http://0.0.0.0:{}", port);
}

pub fn log_health_check() {
    debug!("Health check requested");
}

pub fn log_validation_error(field: &str, message: &str) {
    warn!("Validation error: {} - {}", field, message);
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}

pub fn log_warning(message: &str) {
    warn!("{}", message);
}
