use atelier_config::Settings;
use atelier_services::{
    AuthService, ChatOrchestrator, CompletionBackend, HttpCompletionClient, ScopeResolver,
    dao::{
        chat::ChatDao, organization::OrganizationDao, project::ProjectDao, team::TeamDao,
        user::UserDao,
    },
    orchestrator::MongoChatStore,
};
use mongodb::Database;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub organizations: Arc<OrganizationDao>,
    pub users: Arc<UserDao>,
    pub teams: Arc<TeamDao>,
    pub projects: Arc<ProjectDao>,
    pub chats: Arc<ChatDao>,
    pub scopes: Arc<ScopeResolver>,
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl AppState {
    pub fn new(db: Database, settings: Settings) -> anyhow::Result<Self> {
        let completion: Arc<dyn CompletionBackend> =
            Arc::new(HttpCompletionClient::new(&settings.completion)?);
        Ok(Self::with_completion(db, settings, completion))
    }

    /// Builds the state around an already constructed completion backend.
    pub fn with_completion(
        db: Database,
        settings: Settings,
        completion: Arc<dyn CompletionBackend>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        let organizations = Arc::new(OrganizationDao::new(&db));
        let users = Arc::new(UserDao::new(&db));
        let teams = Arc::new(TeamDao::new(&db));
        let projects = Arc::new(ProjectDao::new(&db));
        let chats = Arc::new(ChatDao::new(&db));
        let scopes = Arc::new(ScopeResolver::new(teams.clone(), projects.clone()));

        let store = Arc::new(MongoChatStore::new(
            chats.clone(),
            projects.clone(),
            teams.clone(),
        ));
        let orchestrator = Arc::new(ChatOrchestrator::new(
            store,
            completion,
            settings.completion.system_prompt.clone(),
            settings.uploads.max_turn_files,
        ));

        Self {
            db,
            settings,
            auth,
            organizations,
            users,
            teams,
            projects,
            chats,
            scopes,
            orchestrator,
        }
    }
}
