use statement_service::config::StatementConfig;
use statement_service::services::MongoDb;
use statement_service::startup::Application;
use std::time::Duration;
use uuid::Uuid;

pub const TEST_USER_ID: &str = "test_user_123";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: MongoDb,
    pub db_name: String,
    pub storage_path: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Build the app with test defaults (random port, unique database and
    /// storage dir, in-process queue, fast fallback) plus a caller tweak.
    pub async fn spawn_with(customize: impl FnOnce(&mut StatementConfig)) -> Self {
        std::env::set_var("MONGODB_URI", "mongodb://localhost:27017");

        let db_name = format!("statement_test_{}", Uuid::new_v4());
        let storage_path = format!("target/test-storage-{}", Uuid::new_v4());

        let mut config = StatementConfig::load().expect("Failed to load configuration");
        config.common.port = 0; // Random port for testing
        config.mongodb.database = db_name.clone();
        config.storage.local_path = storage_path.clone();
        config.extraction.fallback_delay_ms = 25;
        config.worker.worker_count = 2;
        customize(&mut config);

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let db = app.db().clone();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to come up
        let client = reqwest::Client::new();
        let health_url = format!("http://127.0.0.1:{}/health", port);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            db,
            db_name,
            storage_path,
        }
    }

    pub async fn upload(
        &self,
        files: &[(&str, &[u8])],
        project_name: Option<&str>,
        mode: Option<&str>,
    ) -> reqwest::Response {
        let mut form = reqwest::multipart::Form::new();
        for (name, data) in files {
            form = form.part(
                "files",
                reqwest::multipart::Part::bytes(data.to_vec())
                    .file_name(name.to_string())
                    .mime_str("application/pdf")
                    .unwrap(),
            );
        }
        if let Some(name) = project_name {
            form = form.text("projectName", name.to_string());
        }
        if let Some(mode) = mode {
            form = form.text("mode", mode.to_string());
        }

        reqwest::Client::new()
            .post(format!("{}/projects", self.address))
            .header("X-User-ID", TEST_USER_ID)
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute upload request")
    }

    pub async fn get_project(&self, project_id: &str) -> serde_json::Value {
        let response = reqwest::Client::new()
            .get(format!("{}/projects/{}", self.address, project_id))
            .header("X-User-ID", TEST_USER_ID)
            .send()
            .await
            .expect("Failed to fetch project");
        assert!(response.status().is_success());
        response.json().await.expect("Failed to parse project JSON")
    }

    /// The polling contract: fetch the project at a fixed interval until
    /// every file reports a terminal status.
    pub async fn wait_for_project_terminal(
        &self,
        project_id: &str,
        timeout: Duration,
    ) -> serde_json::Value {
        let start = std::time::Instant::now();

        loop {
            let project = self.get_project(project_id).await;
            let files = project["files"].as_array().expect("project has no files");

            let all_terminal = !files.is_empty()
                && files.iter().all(|f| {
                    let status = f["status"].as_str().unwrap_or_default();
                    status == "completed" || status == "error"
                });

            if all_terminal {
                return project;
            }

            if start.elapsed() > timeout {
                panic!("Processing timed out after {:?}", timeout);
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Cleanup test resources (database and storage).
    pub async fn cleanup(&self) {
        let _ = self.db.client().database(&self.db_name).drop(None).await;
        let _ = tokio::fs::remove_dir_all(&self.storage_path).await;
    }
}
