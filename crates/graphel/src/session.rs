//! The statement-execution boundary and the end-to-end save driver.
//!
//! The planner itself never talks to a server; it produces batches of
//! parameterized statements and consumes the identifiers the server
//! hands back. [`StatementSession`] is the seam a protocol client (or a
//! test double) implements, and [`save`] drives one full plan through it.

use asupersync::{Cx, Outcome};

use graphel_core::{Error, Object, ObjectId, Value};
use graphel_save::{SaveExecutor, Statement, compute_ops};

/// Executes single statements against the server.
///
/// Insert statements must return exactly one row carrying the new
/// object's identifier as `Value::Uuid`; update statements may return
/// anything, including nothing.
pub trait StatementSession {
    fn execute(
        &mut self,
        cx: &Cx,
        statement: &Statement,
    ) -> impl Future<Output = Outcome<Vec<Value>, Error>> + Send;
}

/// Plan and persist every change reachable from `roots`.
///
/// Runs insert batches in dependency order, feeds returned identifiers
/// into later statements, applies the update batch, and commits the
/// recorded state into the in-memory graph. On any failure the graph is
/// left exactly as it was: commit happens only after every statement
/// succeeded.
#[tracing::instrument(skip_all, fields(roots = roots.len()))]
pub async fn save<S: StatementSession>(
    cx: &Cx,
    session: &mut S,
    roots: &[Object],
) -> Outcome<(), Error> {
    let plan = match compute_ops(roots) {
        Ok(plan) => plan,
        Err(err) => return Outcome::Err(err),
    };
    let mut executor = SaveExecutor::new(roots.to_vec(), plan);

    while let Some(batch) = executor.next_batch() {
        let statements = match batch {
            Ok(statements) => statements,
            Err(err) => return Outcome::Err(err),
        };
        let inserting = executor.expects_ids();
        let mut returned_ids: Vec<ObjectId> = Vec::with_capacity(statements.len());

        for statement in &statements {
            let rows = match session.execute(cx, statement).await {
                Outcome::Ok(rows) => rows,
                Outcome::Err(err) => return Outcome::Err(err),
                Outcome::Cancelled(reason) => return Outcome::Cancelled(reason),
                Outcome::Panicked(payload) => return Outcome::Panicked(payload),
            };
            if inserting {
                match rows.first() {
                    Some(Value::Uuid(id)) => returned_ids.push(*id),
                    _ => {
                        return Outcome::Err(Error::Custom(format!(
                            "insert returned no identifier: {}",
                            statement.text
                        )));
                    }
                }
            }
        }

        if inserting {
            if let Err(err) = executor.feed_ids(&returned_ids) {
                return Outcome::Err(err);
            }
        }
    }

    match executor.commit() {
        Ok(()) => Outcome::Ok(()),
        Err(err) => Outcome::Err(err),
    }
}
