use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{
    ClubId, EventId, MemberId, NewClub, NewEvent, NewMember, NewRole, NewUnit, RoleGrant, RoleId,
    TaskId, TaskStatus, UnitId,
};
use super::error::RosterError;
use super::import::ImportError;
use super::repository::{NotificationPublisher, RepositoryError, RosterStore};
use super::RosterServices;

type Api<S, N> = State<Arc<RosterServices<S, N>>>;

/// Router builder exposing the roster, event and allocation operations.
pub fn roster_router<S, N>(services: Arc<RosterServices<S, N>>) -> Router
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/clubs",
            get(list_clubs::<S, N>).post(create_club::<S, N>),
        )
        .route(
            "/api/v1/clubs/:club_id",
            get(get_club::<S, N>)
                .put(update_club::<S, N>)
                .delete(delete_club::<S, N>),
        )
        .route(
            "/api/v1/clubs/:club_id/units",
            get(list_units::<S, N>).post(create_unit::<S, N>),
        )
        .route(
            "/api/v1/clubs/:club_id/members",
            get(list_members::<S, N>).post(register_member::<S, N>),
        )
        .route(
            "/api/v1/clubs/:club_id/members/import",
            post(import_members::<S, N>),
        )
        .route(
            "/api/v1/clubs/:club_id/roles",
            get(list_roles::<S, N>).post(create_role::<S, N>),
        )
        .route(
            "/api/v1/clubs/:club_id/events",
            get(list_events::<S, N>).post(create_event::<S, N>),
        )
        .route("/api/v1/clubs/:club_id/tasks", get(list_tasks::<S, N>))
        .route(
            "/api/v1/units/:unit_id",
            get(get_unit::<S, N>)
                .put(update_unit::<S, N>)
                .delete(delete_unit::<S, N>),
        )
        .route(
            "/api/v1/members/:member_id",
            get(get_member::<S, N>)
                .put(update_member::<S, N>)
                .delete(remove_member::<S, N>),
        )
        .route(
            "/api/v1/members/:member_id/roles",
            get(member_roles::<S, N>).post(grant_role::<S, N>),
        )
        .route(
            "/api/v1/members/:member_id/roles/:role_id",
            delete(revoke_role::<S, N>),
        )
        .route("/api/v1/members/:member_id/age", get(member_age::<S, N>))
        .route(
            "/api/v1/members/:member_id/allocation",
            post(allocate_member::<S, N>),
        )
        .route(
            "/api/v1/members/:member_id/allocation/candidates",
            get(allocation_candidates::<S, N>),
        )
        .route("/api/v1/members/:member_id/unit", put(assign_unit::<S, N>))
        .route("/api/v1/roles/:role_id", delete(delete_role::<S, N>))
        .route(
            "/api/v1/events/:event_id",
            get(get_event::<S, N>).delete(delete_event::<S, N>),
        )
        .route(
            "/api/v1/events/:event_id/participants",
            post(register_participant::<S, N>),
        )
        .route(
            "/api/v1/events/:event_id/participants/:member_id",
            delete(unregister_participant::<S, N>),
        )
        .route(
            "/api/v1/events/:event_id/eligible-members",
            get(eligible_members::<S, N>),
        )
        .route(
            "/api/v1/tasks/:task_id/resolve",
            post(resolve_task::<S, N>),
        )
        .with_state(services)
}

impl IntoResponse for RosterError {
    fn into_response(self) -> Response {
        let status = match &self {
            RosterError::Validation { .. }
            | RosterError::Ineligible(_)
            | RosterError::NoMatchingUnit { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RosterError::NotFound { .. } | RosterError::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            RosterError::Conflict(_)
            | RosterError::UnitFull { .. }
            | RosterError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            RosterError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RosterError::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "roster request failed");
        }

        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}

fn reply<T: Serialize>(status: StatusCode, result: Result<T, RosterError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct YearQuery {
    pub(crate) year: Option<i32>,
}

impl YearQuery {
    fn year_or(&self, today: NaiveDate) -> i32 {
        self.year.unwrap_or_else(|| today.year())
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MemberFilter {
    pub(crate) unit_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TaskFilter {
    pub(crate) status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnitChoice {
    pub(crate) unit_id: UnitId,
    #[serde(default)]
    pub(crate) year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParticipantRequest {
    pub(crate) member_id: MemberId,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TaskResolution {
    #[serde(default)]
    pub(crate) note: Option<String>,
}

#[derive(Debug, Serialize)]
struct AgeView {
    member_id: MemberId,
    year: i32,
    reference_date: NaiveDate,
    reference_age: u32,
}

pub(crate) async fn list_clubs<S, N>(State(api): Api<S, N>) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.roster.clubs())
}

pub(crate) async fn create_club<S, N>(
    State(api): Api<S, N>,
    Json(new_club): Json<NewClub>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::CREATED, api.roster.create_club(new_club))
}

pub(crate) async fn get_club<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.roster.club(&ClubId(club_id)))
}

pub(crate) async fn update_club<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
    Json(update): Json<NewClub>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.roster.update_club(&ClubId(club_id), update))
}

pub(crate) async fn delete_club<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.roster.delete_club(&ClubId(club_id)))
}

pub(crate) async fn list_units<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    let club_id = ClubId(club_id);
    let result = api
        .roster
        .club(&club_id)
        .and_then(|_| api.roster.units(&club_id));
    reply(StatusCode::OK, result)
}

pub(crate) async fn create_unit<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
    Json(new_unit): Json<NewUnit>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(
        StatusCode::CREATED,
        api.roster.create_unit(&ClubId(club_id), new_unit),
    )
}

pub(crate) async fn get_unit<S, N>(
    State(api): Api<S, N>,
    Path(unit_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.roster.unit(&UnitId(unit_id)))
}

pub(crate) async fn update_unit<S, N>(
    State(api): Api<S, N>,
    Path(unit_id): Path<String>,
    Json(update): Json<NewUnit>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.roster.update_unit(&UnitId(unit_id), update))
}

pub(crate) async fn delete_unit<S, N>(
    State(api): Api<S, N>,
    Path(unit_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.roster.delete_unit(&UnitId(unit_id)))
}

pub(crate) async fn list_members<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
    Query(filter): Query<MemberFilter>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    let club_id = ClubId(club_id);
    let unit_id = filter.unit_id.map(UnitId);
    let result = api
        .roster
        .club(&club_id)
        .and_then(|_| api.roster.members(&club_id, unit_id.as_ref()));
    reply(StatusCode::OK, result)
}

pub(crate) async fn register_member<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
    Json(new_member): Json<NewMember>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(
        StatusCode::CREATED,
        api.roster
            .register_member(&ClubId(club_id), new_member, today()),
    )
}

pub(crate) async fn import_members<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
    body: String,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    match api
        .importer()
        .import_reader(body.as_bytes(), &ClubId(club_id), today())
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(ImportError::Roster(err)) => err.into_response(),
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn get_member<S, N>(
    State(api): Api<S, N>,
    Path(member_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.roster.member(&MemberId(member_id)))
}

pub(crate) async fn update_member<S, N>(
    State(api): Api<S, N>,
    Path(member_id): Path<String>,
    Json(update): Json<NewMember>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(
        StatusCode::OK,
        api.roster
            .update_member(&MemberId(member_id), update, today()),
    )
}

pub(crate) async fn remove_member<S, N>(
    State(api): Api<S, N>,
    Path(member_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.roster.remove_member(&MemberId(member_id)))
}

pub(crate) async fn member_age<S, N>(
    State(api): Api<S, N>,
    Path(member_id): Path<String>,
    Query(query): Query<YearQuery>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    let year = query.year_or(today());
    let policy = api.allocation.policy();
    let result = api.roster.member(&MemberId(member_id)).and_then(|member| {
        let reference_age = api.allocation.reference_age(&member, year)?;
        let reference_date = policy
            .reference_date(year)
            .ok_or_else(|| RosterError::validation("year", format!("{year} is out of range")))?;
        Ok(AgeView {
            member_id: member.id,
            year,
            reference_date,
            reference_age,
        })
    });
    reply(StatusCode::OK, result)
}

pub(crate) async fn list_roles<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    let club_id = ClubId(club_id);
    let result = api
        .roster
        .club(&club_id)
        .and_then(|_| api.roster.roles(&club_id));
    reply(StatusCode::OK, result)
}

pub(crate) async fn create_role<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
    Json(new_role): Json<NewRole>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(
        StatusCode::CREATED,
        api.roster.create_role(&ClubId(club_id), new_role),
    )
}

pub(crate) async fn delete_role<S, N>(
    State(api): Api<S, N>,
    Path(role_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.roster.delete_role(&RoleId(role_id)))
}

pub(crate) async fn member_roles<S, N>(
    State(api): Api<S, N>,
    Path(member_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.roster.member_roles(&MemberId(member_id)))
}

pub(crate) async fn grant_role<S, N>(
    State(api): Api<S, N>,
    Path(member_id): Path<String>,
    Json(grant): Json<RoleGrant>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(
        StatusCode::CREATED,
        api.roster.grant_role(&MemberId(member_id), grant),
    )
}

pub(crate) async fn revoke_role<S, N>(
    State(api): Api<S, N>,
    Path((member_id, role_id)): Path<(String, String)>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(
        StatusCode::OK,
        api.roster
            .revoke_role(&MemberId(member_id), &RoleId(role_id)),
    )
}

pub(crate) async fn allocate_member<S, N>(
    State(api): Api<S, N>,
    Path(member_id): Path<String>,
    Query(query): Query<YearQuery>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    let today = today();
    reply(
        StatusCode::OK,
        api.allocation
            .allocate(&MemberId(member_id), query.year_or(today), today),
    )
}

pub(crate) async fn allocation_candidates<S, N>(
    State(api): Api<S, N>,
    Path(member_id): Path<String>,
    Query(query): Query<YearQuery>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(
        StatusCode::OK,
        api.allocation
            .candidates(&MemberId(member_id), query.year_or(today())),
    )
}

pub(crate) async fn assign_unit<S, N>(
    State(api): Api<S, N>,
    Path(member_id): Path<String>,
    Json(choice): Json<UnitChoice>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    let year = choice.year.unwrap_or_else(|| today().year());
    reply(
        StatusCode::OK,
        api.allocation
            .assign(&MemberId(member_id), &choice.unit_id, year),
    )
}

pub(crate) async fn list_tasks<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
    Query(filter): Query<TaskFilter>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(
        StatusCode::OK,
        api.allocation.tasks(&ClubId(club_id), filter.status),
    )
}

pub(crate) async fn resolve_task<S, N>(
    State(api): Api<S, N>,
    Path(task_id): Path<String>,
    Json(resolution): Json<TaskResolution>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(
        StatusCode::OK,
        api.allocation
            .resolve_task(&TaskId(task_id), today(), resolution.note),
    )
}

pub(crate) async fn list_events<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.events.list(&ClubId(club_id)))
}

pub(crate) async fn create_event<S, N>(
    State(api): Api<S, N>,
    Path(club_id): Path<String>,
    Json(new_event): Json<NewEvent>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(
        StatusCode::CREATED,
        api.events.create(&ClubId(club_id), new_event),
    )
}

pub(crate) async fn get_event<S, N>(
    State(api): Api<S, N>,
    Path(event_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.events.get(&EventId(event_id)))
}

pub(crate) async fn delete_event<S, N>(
    State(api): Api<S, N>,
    Path(event_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.events.delete(&EventId(event_id)))
}

pub(crate) async fn register_participant<S, N>(
    State(api): Api<S, N>,
    Path(event_id): Path<String>,
    Json(request): Json<ParticipantRequest>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(
        StatusCode::CREATED,
        api.events.register(&EventId(event_id), &request.member_id),
    )
}

pub(crate) async fn unregister_participant<S, N>(
    State(api): Api<S, N>,
    Path((event_id, member_id)): Path<(String, String)>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(
        StatusCode::OK,
        api.events
            .unregister(&EventId(event_id), &MemberId(member_id)),
    )
}

pub(crate) async fn eligible_members<S, N>(
    State(api): Api<S, N>,
    Path(event_id): Path<String>,
) -> Response
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    reply(StatusCode::OK, api.events.eligible_members(&EventId(event_id)))
}
