mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread, time::Duration};

use qdrant_client::Qdrant;
use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::{
	runtime::{Builder, Runtime},
	time,
};
use uuid::Uuid;

use stow_config::Postgres;

const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];

/// A throwaway Postgres database created through the admin connection behind
/// `STOW_PG_DSN`. Dropped by [`cleanup`](Self::cleanup), or from `Drop` when a
/// panicking test never reaches it.
pub struct TestDatabase {
	name: String,
	options: PgConnectOptions,
	admin_options: PgConnectOptions,
	cleaned: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse STOW_PG_DSN: {err}.")))?;
		let (admin_options, mut admin_conn) = connect_admin(&base_options).await?;
		let name = format!("stow_test_{}", Uuid::new_v4().simple());

		admin_conn
			.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create test database: {err}.")))?;

		let options = base_options.database(&name);

		Ok(Self { name, options, admin_options, cleaned: false })
	}

	/// Connection settings pointed at the throwaway database.
	pub fn postgres_config(&self, pool_max_conns: u32) -> Postgres {
		Postgres { dsn: self.options.to_url_lossy().to_string(), pool_max_conns }
	}

	pub async fn cleanup(mut self) -> Result<()> {
		drop_database(&self.name, &self.admin_options).await?;

		self.cleaned = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let name = self.name.clone();
		let admin_options = self.admin_options.clone();

		block_on_cleanup(move |runtime| {
			if let Err(err) = runtime.block_on(drop_database(&name, &admin_options)) {
				eprintln!("Test database cleanup failed: {err}.");
			}
		});
	}
}

/// A uniquely named Qdrant collection bound to the instance that hosts it.
pub struct TestCollection {
	name: String,
	url: String,
	cleaned: bool,
}
impl TestCollection {
	pub fn new(url: &str, label: &str) -> Self {
		Self {
			name: format!("stow_test_{label}_{}", Uuid::new_v4().simple()),
			url: url.to_string(),
			cleaned: false,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub async fn cleanup(mut self) -> Result<()> {
		delete_collection(&self.url, &self.name).await?;

		self.cleaned = true;

		Ok(())
	}
}
impl Drop for TestCollection {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let url = self.url.clone();
		let name = self.name.clone();

		block_on_cleanup(move |runtime| {
			if let Err(err) = runtime.block_on(delete_collection(&url, &name)) {
				eprintln!("Test Qdrant cleanup failed: {err}.");
			}
		});
	}
}

/// Unique scope key in the `kind:uuid` shape the service parses, so suites
/// sharing one database never see each other's rows.
pub fn scope_key(kind: &str) -> String {
	format!("{kind}:{}", Uuid::new_v4())
}

pub fn env_dsn() -> Option<String> {
	env::var("STOW_PG_DSN").ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("STOW_QDRANT_URL").ok()
}

// `Drop` cannot await, so last-resort cleanup runs on a throwaway
// current-thread runtime in its own thread.
fn block_on_cleanup(cleanup: impl FnOnce(&Runtime) + Send + 'static) {
	let cleanup_thread = thread::spawn(move || {
		let runtime = match Builder::new_current_thread().enable_all().build() {
			Ok(runtime) => runtime,
			Err(err) => {
				eprintln!("Test cleanup runtime failed to start: {err}.");

				return;
			},
		};

		cleanup(&runtime);
	});
	let _ = cleanup_thread.join();
}

async fn connect_admin(
	base_options: &PgConnectOptions,
) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_err = None;

	for database in ADMIN_DATABASES {
		let options = base_options.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => {
				last_err = Some(err);
			},
		}
	}

	Err(Error::Message(format!("Failed to connect to an admin database: {last_err:?}.")))
}

async fn drop_database(name: &str, admin_options: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin_options).await.map_err(|err| {
		Error::Message(format!("Failed to connect to admin database for cleanup: {err}."))
	})?;

	// A straggler connection left by a panicked test blocks the drop.
	let _ = sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut conn)
	.await;

	sqlx::query(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str())
		.execute(&mut conn)
		.await
		.map_err(|err| Error::Message(format!("Failed to drop test database: {err}.")))?;

	Ok(())
}

async fn delete_collection(url: &str, collection: &str) -> Result<()> {
	let client = Qdrant::from_url(url)
		.build()
		.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))?;
	let max_attempts = 6;
	let mut backoff = Duration::from_millis(100);

	for attempt in 1..=max_attempts {
		let exists = time::timeout(Duration::from_secs(10), client.collection_exists(collection))
			.await
			.map_err(|_| Error::Message("Qdrant collection_exists timed out.".to_string()))?
			.map_err(|err| Error::Message(format!("Failed to check Qdrant collection: {err}.")))?;

		if !exists {
			return Ok(());
		}

		let result =
			time::timeout(Duration::from_secs(10), client.delete_collection(collection)).await;

		match result {
			Ok(Ok(_)) => return Ok(()),
			Ok(Err(err)) if attempt == max_attempts =>
				return Err(Error::Message(format!(
					"Failed to delete Qdrant collection {collection:?} after {attempt} attempts: {err}."
				))),
			Err(_) if attempt == max_attempts =>
				return Err(Error::Message(format!(
					"Timed out deleting Qdrant collection {collection:?} after {attempt} attempts."
				))),
			_ => {},
		}

		time::sleep(backoff).await;

		backoff = backoff.saturating_mul(2).min(Duration::from_secs(2));
	}

	Ok(())
}
