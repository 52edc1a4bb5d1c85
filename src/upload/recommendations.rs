//! Static advice shown next to a prediction.

const DR: &[&str] = &[
    "You may have signs of diabetic retinopathy. Schedule an urgent ophthalmic evaluation with a retina specialist for confirmation and staging.",
    "Ensure tight control of blood glucose, blood pressure, and lipids, as these factors significantly impact DR progression.",
];

const GLAUCOMA: &[&str] = &[
    "Do not delay: untreated glaucoma can lead to irreversible optic nerve damage and vision loss.",
    "Encourage close follow-up with an ophthalmologist even if no symptoms are present, as glaucoma is often asymptomatic in early stages.",
];

const NORMAL: &[&str] = &[
    "Your fundus image appears normal. However, this does not rule out all eye diseases. Maintain routine annual eye checkups.",
    "Continue healthy lifestyle habits: manage blood pressure, glucose levels, and avoid smoking to protect ocular health.",
    "In the presence of any visual symptoms (blurring, floaters, field loss), seek immediate ophthalmologic evaluation despite a normal image.",
];

/// Unknown classes get no advice.
pub fn for_class(predicted_class: &str) -> &'static [&'static str] {
    match predicted_class {
        "DR" => DR,
        "Glaucoma" => GLAUCOMA,
        "Normal" => NORMAL,
        _ => &[],
    }
}
