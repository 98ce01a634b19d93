/// System prompt shared by every provider
pub const DOCUMENT_ANALYSIS_SYSTEM_PROMPT: &str = "You are a document analysis expert. Analyze documents and provide structured information for categorization.";

/// Detailed prompt for cloud models
pub fn detailed_analysis_prompt(text: &str) -> String {
    format!(
        r#"Analyze the following document text and extract key information for categorization.

Document text:
{text}

Please provide the following information in JSON format:
1. company_name: The company or organization that issued this document
2. document_type: Type of document (e.g., "bank statement", "invoice", "bill", "receipt", "tax document", "insurance", "contract", "letter", etc.)
3. date: The primary date of the document in YYYY-MM-DD format
4. confidence_score: Your confidence in this categorization (0.0 to 1.0)
5. suggested_name: A descriptive filename for this document
6. additional_metadata: Any other relevant information (account numbers, amounts, etc.)

Respond ONLY with valid JSON. Example:
{{
    "company_name": "Chase Bank",
    "document_type": "bank statement",
    "date": "2023-03-15",
    "confidence_score": 0.95,
    "suggested_name": "Chase Bank Statement March 2023",
    "additional_metadata": {{
        "account_type": "checking",
        "statement_period": "March 2023"
    }}
}}"#
    )
}

/// Short prompt for local models with small context windows
pub fn simple_analysis_prompt(text: &str) -> String {
    format!(
        r#"Extract information from this document and respond with ONLY valid JSON:

Document text:
{text}

Required JSON format:
{{
    "company_name": "company name or null",
    "document_type": "document type or null",
    "date": "YYYY-MM-DD or null",
    "confidence_score": 0.8,
    "suggested_name": "descriptive name"
}}

JSON:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_embed_text() {
        assert!(detailed_analysis_prompt("ACME INVOICE").contains("ACME INVOICE"));
        assert!(simple_analysis_prompt("ACME INVOICE").contains("ACME INVOICE"));
    }

    #[test]
    fn test_prompts_keep_literal_braces() {
        assert!(simple_analysis_prompt("x").contains("\"company_name\": \"company name or null\""));
        assert!(detailed_analysis_prompt("x").contains("\"additional_metadata\": {"));
    }
}
