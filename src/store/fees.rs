use super::parse_bool;
use crate::model::FeePayment;
use rusqlite::Connection;

pub fn insert_payment(conn: &Connection, p: &FeePayment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO fee_payments(id, student_id, amount_paid, term, is_paid_in_full, date_paid, payment_method)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &p.id,
            &p.student_id,
            p.amount_paid,
            &p.term,
            p.is_paid_in_full as i64,
            &p.date_paid,
            &p.payment_method,
        ),
    )?;
    Ok(())
}

/// Newest payment first.
pub fn list_for_student(conn: &Connection, student_id: &str) -> rusqlite::Result<Vec<FeePayment>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, amount_paid, term, is_paid_in_full, date_paid, payment_method
         FROM fee_payments WHERE student_id = ? ORDER BY date_paid DESC, id",
    )?;
    let rows = stmt.query_map([student_id], |r| {
        Ok(FeePayment {
            id: r.get(0)?,
            student_id: r.get(1)?,
            amount_paid: r.get(2)?,
            term: r.get(3)?,
            is_paid_in_full: parse_bool(r.get(4)?),
            date_paid: r.get(5)?,
            payment_method: r.get(6)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::open_temp;

    #[test]
    fn payments_list_newest_first() {
        let (_dir, conn) = open_temp();
        for (id, date) in [("p1", "2026-01-01T00:00:00.000Z"), ("p2", "2026-02-01T00:00:00.000Z")] {
            insert_payment(
                &conn,
                &FeePayment {
                    id: id.into(),
                    student_id: "s1".into(),
                    amount_paid: 150.0,
                    term: "Term 1".into(),
                    is_paid_in_full: false,
                    date_paid: date.into(),
                    payment_method: Some("card".into()),
                },
            )
            .expect("insert");
        }
        let ids: Vec<String> = list_for_student(&conn, "s1")
            .expect("list")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p2".to_string(), "p1".to_string()]);
        assert!(list_for_student(&conn, "s2").expect("list").is_empty());
    }
}
