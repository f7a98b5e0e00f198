use apicheck::config::Config;
use apicheck::http::{Session, SessionOptions};
use wiremock::MockServer;

pub fn session() -> Session {
    Session::open(&SessionOptions::from(&Config::default())).expect("session opens")
}

/// Config whose three base URLs all point at `server`.
pub fn config_for(server: &MockServer) -> Config {
    Config {
        reqres_url: server.uri(),
        jsonplaceholder_url: server.uri(),
        httpbin_url: server.uri(),
        ..Config::default()
    }
}
