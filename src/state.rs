use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::kv::KvStore;
use crate::repositories::{AttendanceRepository, StoryRepository, UserRepository};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub kv: Arc<KvStore>,
    pub config: Config,
    pub users: Arc<UserRepository>,
    pub stories: Arc<StoryRepository>,
    pub attendances: Arc<AttendanceRepository>,
}

impl AppState {
    pub fn new(db: DbPool, kv: KvStore, config: Config) -> Self {
        Self {
            users: Arc::new(UserRepository::new(db.clone())),
            stories: Arc::new(StoryRepository::new(db.clone())),
            attendances: Arc::new(AttendanceRepository::new(db.clone())),
            kv: Arc::new(kv),
            db,
            config,
        }
    }
}
