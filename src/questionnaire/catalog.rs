//! The cotton-farming questionnaire used in the field.
//!
//! Labels exist for English, Hindi, Telugu and Marathi. A few labels are
//! English-only and fall back at lookup time.

use super::{FieldSpec, Questionnaire, QuestionnaireError};

/// Language codes the built-in questionnaire carries labels for.
pub const LANGUAGES: [&str; 4] = ["en", "hi", "te", "mr"];

/// Id of the surveyor-name field.
pub const SURVEYOR_FIELD: &str = "surveyor_name";

/// Builds the cotton survey questionnaire.
pub fn cotton_survey() -> Result<Questionnaire, QuestionnaireError> {
    let fields = vec![
        FieldSpec::text(SURVEYOR_FIELD)
            .required()
            .label("en", "Name of Surveyor")
            .label("hi", "सर्वेक्षक का नाम")
            .label("te", "సర్వేయర్ పేరు")
            .label("mr", "सर्वेक्षकाचे नाव"),
        FieldSpec::text("visit_date")
            .required()
            .label("en", "Date of Visit")
            .label("hi", "भेट की तारीख")
            .label("te", "సందర్శన తేదీ")
            .label("mr", "भेटीची तारीख"),
        FieldSpec::text("farmer_name")
            .required()
            .label("en", "Farmer Name")
            .label("hi", "किसान का नाम")
            .label("te", "రైతు పేరు")
            .label("mr", "शेतकऱ्याचे नाव"),
        FieldSpec::text("farmer_code")
            .label("en", "Farmer Code")
            .label("hi", "किसान कोड"),
        FieldSpec::single_choice("gender", ["Male", "Female", "Others"])
            .required()
            .label("en", "Gender")
            .label("hi", "लिंग")
            .label("te", "లింగం")
            .label("mr", "लिंग"),
        FieldSpec::digits("mobile_number", 10)
            .required()
            .label("en", "Mobile Number")
            .label("hi", "मोबाइल नंबर")
            .label("te", "మొబైల్ నంబర్")
            .label("mr", "मोबाईल क्रमांक"),
        FieldSpec::text("village")
            .required()
            .label("en", "Village")
            .label("hi", "गाँव")
            .label("te", "గ్రామం")
            .label("mr", "गाव"),
        FieldSpec::number("farm_size")
            .required()
            .label("en", "Farm Size (Acres)")
            .label("hi", "खेत का आकार (एकड़)")
            .label("te", "వ్యవసాయ భూమి (ఎకరాలు)")
            .label("mr", "शेताचा आकार (एकर)"),
        FieldSpec::single_choice(
            "irrigation_source",
            ["Canal", "Borewell", "Open Well", "Rainfed", "Other"],
        )
        .label("en", "Irrigation Source")
        .label("hi", "सिंचाई का स्रोत")
        .label("te", "నీటిపారుదల వనరు")
        .label("mr", "सिंचनाचा स्रोत"),
        FieldSpec::text("cotton_variety")
            .label("en", "Cotton Variety")
            .label("hi", "कपास की किस्म")
            .label("te", "పత్తి రకం")
            .label("mr", "कापसाची जात"),
        FieldSpec::text("sowing_date")
            .label("en", "Sowing Date")
            .label("hi", "बुवाई की तारीख")
            .label("te", "విత్తిన తేదీ")
            .label("mr", "पेरणीची तारीख"),
        FieldSpec::yes_no("seed_treatment")
            .required()
            .label("en", "Seed Treatment")
            .label("hi", "बीज उपचार")
            .label("te", "విత్తన శుద్ధి")
            .label("mr", "बीज प्रक्रिया"),
        FieldSpec::multi_choice("fertilizers_used", ["Urea", "DAP", "MOP", "Compost", "Other"])
            .label("en", "Fertilizer Used")
            .label("hi", "प्रयुक्त उर्वरक"),
        FieldSpec::amount("fertilizer_quantity")
            .label("en", "Fertilizer Quantity (Kg/Acre)")
            .label("hi", "उर्वरक की मात्रा (किग्रा/एकड़)"),
        FieldSpec::yes_no("pesticides_used")
            .label("en", "Pesticides Used")
            .label("hi", "कीटनाशकों का प्रयोग"),
        FieldSpec::text("pesticide_type")
            .label("en", "Pesticide Type")
            .label("hi", "कीटनाशक का प्रकार"),
        FieldSpec::number("pesticide_quantity")
            .label("en", "Pesticide Quantity (ml/Acre)")
            .label("hi", "कीटनाशक की मात्रा (मिली/एकड़)"),
        FieldSpec::comma_parts("harvesting_months", 3)
            .label("en", "Harvesting Months (3, comma separated)")
            .label("hi", "कटाई के महीने (3, अल्पविराम से अलग)"),
        FieldSpec::amount("expected_yield")
            .required()
            .label("en", "Yield Expected (Kg/Acre)")
            .label("hi", "अपेक्षित उपज (किग्रा/एकड़)")
            .label("te", "ఆశించిన దిగుబడి (కిలో/ఎకరం)")
            .label("mr", "अपेक्षित उत्पादन (किलो/एकर)"),
        FieldSpec::amount("selling_price")
            .required()
            .label("en", "Selling Price (Rs/Quintal)")
            .label("hi", "बिक्री मूल्य (रु./क्विंटल)")
            .label("te", "అమ్మకపు ధర (రూ./క్వింటాల్)")
            .label("mr", "विक्री किंमत (रु./क्विंटल)"),
        FieldSpec::amount("annual_income")
            .required()
            .label("en", "Annual Income from Cotton (Rs)")
            .label("hi", "कपास से वार्षिक आय (रु.)")
            .label("te", "పత్తి నుండి వార్షిక ఆదాయం (రూ.)")
            .label("mr", "कापसापासून वार्षिक उत्पन्न (रु.)"),
        FieldSpec::yes_no("fpo_member")
            .label("en", "Member of Farmer Producer Organisation")
            .label("hi", "किसान उत्पादक संगठन के सदस्य"),
    ];

    Questionnaire::new(fields)?.with_surveyor_field(SURVEYOR_FIELD)
}
