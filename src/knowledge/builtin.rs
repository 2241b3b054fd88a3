use super::loader::RawIngredient;
use super::types::{EthicalStatus, RiskLevel};

/// The additive table compiled into the binary, in definition order.
///
/// Goes through the same validation as an external knowledge base file.
pub fn builtin_entries() -> Vec<RawIngredient> {
    use EthicalStatus::*;
    use RiskLevel::*;

    vec![
        // Flavour enhancers
        builtin_entry(
            "E621",
            Harmful,
            None,
            "MSG (monosodium glutamate); can cause headaches when consumed in excess.",
        ),
        builtin_entry(
            "E627",
            Caution,
            Some(Questionable),
            "Disodium guanylate; may be derived from fish or meat.",
        ),
        builtin_entry(
            "E631",
            Caution,
            Some(Questionable),
            "Disodium inosinate; often produced from meat or fish.",
        ),
        // Sweeteners
        builtin_entry(
            "E951",
            Harmful,
            None,
            "Aspartame; under investigation as a possible carcinogen.",
        ),
        builtin_entry(
            "E950",
            Caution,
            None,
            "Acesulfame K; artificial sweetener, long-term effects still studied.",
        ),
        builtin_entry(
            "E955",
            Caution,
            None,
            "Sucralose; artificial sweetener, may affect gut flora.",
        ),
        // Acids and preservatives
        builtin_entry(
            "E330",
            Safe,
            Some(Permitted),
            "Citric acid; generally regarded as safe.",
        ),
        builtin_entry(
            "E211",
            Caution,
            None,
            "Sodium benzoate; can form benzene together with vitamin C.",
        ),
        builtin_entry(
            "E250",
            Harmful,
            None,
            "Sodium nitrite; linked to nitrosamine formation in cured meat.",
        ),
        builtin_entry(
            "E220",
            Caution,
            None,
            "Sulphur dioxide; can trigger asthma in sensitive people.",
        ),
        // Colours
        builtin_entry(
            "E102",
            Harmful,
            None,
            "Tartrazine; azo dye associated with hyperactivity in children.",
        ),
        builtin_entry(
            "E110",
            Harmful,
            None,
            "Sunset yellow; azo dye associated with hyperactivity in children.",
        ),
        builtin_entry(
            "E120",
            Caution,
            Some(Forbidden),
            "Carmine; red colour made from insects.",
        ),
        builtin_entry(
            "E150d",
            Caution,
            None,
            "Sulphite ammonia caramel; may contain 4-MEI.",
        ),
        builtin_entry(
            "E171",
            Harmful,
            None,
            "Titanium dioxide; no longer considered safe as a food additive in the EU.",
        ),
        // Thickeners and emulsifiers
        builtin_entry(
            "E322",
            Safe,
            Some(Permitted),
            "Lecithin; usually derived from soy or sunflower.",
        ),
        builtin_entry(
            "E407",
            Caution,
            None,
            "Carrageenan; may irritate the digestive tract.",
        ),
        builtin_entry(
            "E441",
            Safe,
            Some(Forbidden),
            "Gelatine; commonly of porcine origin.",
        ),
        builtin_entry(
            "E471",
            Caution,
            Some(Questionable),
            "Mono- and diglycerides of fatty acids; may be of animal origin.",
        ),
        builtin_entry(
            "E904",
            Safe,
            Some(Questionable),
            "Shellac; glazing agent secreted by insects.",
        ),
        // Named ingredients
        builtin_entry(
            "Sugar",
            Caution,
            None,
            "Can contribute to obesity when consumed in large amounts.",
        ),
        builtin_entry(
            "Palm oil",
            Caution,
            None,
            "High in saturated fat.",
        ),
        builtin_entry(
            "Glucose syrup",
            Caution,
            None,
            "Rapidly absorbed sugar; raises blood glucose quickly.",
        ),
        builtin_entry(
            "Alcohol",
            Caution,
            Some(Forbidden),
            "Ethanol; may be used as a carrier for flavourings.",
        ),
    ]
}

fn builtin_entry(
    identifier: &str,
    risk: RiskLevel,
    status: Option<EthicalStatus>,
    description: &str,
) -> RawIngredient {
    RawIngredient {
        identifier: Some(identifier.to_string()),
        risk: Some(risk),
        status,
        description: Some(description.to_string()),
    }
}
