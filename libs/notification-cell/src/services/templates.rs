use chrono::NaiveDate;

/// Fields of a booking that go into the patient confirmation message.
#[derive(Debug, Clone)]
pub struct BookingConfirmation<'a> {
    pub booking_id: &'a str,
    pub patient_name: &'a str,
    pub doctor_name: &'a str,
    pub specialization: Option<&'a str>,
    pub date: NaiveDate,
    pub time: &'a str,
    pub consultation_fee: f64,
    pub remaining_amount: f64,
}

pub fn format_booking_confirmation(confirmation: &BookingConfirmation<'_>) -> String {
    let mut lines = vec![
        format!("Hello {},", confirmation.patient_name),
        String::new(),
        "Your appointment is confirmed.".to_string(),
        format!("Doctor: {}", confirmation.doctor_name),
    ];

    if let Some(specialization) = confirmation.specialization.filter(|s| !s.trim().is_empty()) {
        lines.push(format!("Specialization: {}", specialization));
    }

    lines.push(format!("Date: {}", confirmation.date.format("%d %b %Y")));
    lines.push(format!("Time: {}", confirmation.time));
    lines.push(format!("Consultation fee: ₹{:.2}", confirmation.consultation_fee));

    if confirmation.remaining_amount > 0.0 {
        lines.push(format!("Amount due at visit: ₹{:.2}", confirmation.remaining_amount));
    }

    lines.push(String::new());
    lines.push(format!("Booking ID: {}", confirmation.booking_id));

    lines.join("\n")
}
