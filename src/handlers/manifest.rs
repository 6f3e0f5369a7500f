use crate::procedures::ProcedureTable;
use crate::protocol::{HttpResponse, StatusCode};

/// Handle a `GET` on the endpoint.
///
/// Lists the registered procedures with their arity, sorted by name, so a
/// caller can check that the call surface it was built against is served.
pub fn handle(table: &ProcedureTable) -> HttpResponse {
    HttpResponse::json(StatusCode::OK, &table.manifest())
}
