pub mod browser_login;
pub mod octopus;
pub mod tado_auth;
pub mod tado_eiq;
pub mod token_file;
