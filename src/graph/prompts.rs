// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Default prompt templates. Each can be replaced from configuration;
//! `{placeholders}` are filled by the template layer of the model client.

pub const GRAPH_EXTRACTION: &str = "\
-Goal-
Given a text document and a list of entity types, identify all entities of those types and all relationships among the identified entities.

-Steps-
1. For each entity output (\"entity\"{tuple_delimiter}<entity_name>{tuple_delimiter}<entity_type>{tuple_delimiter}<entity_description>). The name is capitalized; the type is one of [{entity_types}].
2. For each pair of clearly related entities output (\"relationship\"{tuple_delimiter}<source_entity>{tuple_delimiter}<target_entity>{tuple_delimiter}<relationship_description>{tuple_delimiter}<relationship_strength>) where the strength is a number from 1 to 10.
3. Separate records with {record_delimiter}.
4. When finished, output {completion_delimiter}

-Text-
{input_text}
Output:";

pub const CONTINUE_EXTRACTION: &str =
    "MANY entities were missed in the last extraction. Add them below using the same format:";

pub const LOOP_CHECK: &str =
    "It appears some entities may have still been missed. Answer YES if there are still entities that need to be added, or NO if there are none.";

pub const SUMMARIZE_DESCRIPTIONS: &str = "\
You are responsible for generating a comprehensive summary of the data below.
Given one or two entities and a list of descriptions related to them, write a single description in the third person that includes the information from all of them, resolving any contradictions. Keep it under {max_length} characters.

Entities: {entity_name}
Description List:
{description_list}
Output:";

pub const CLAIM_EXTRACTION: &str = "\
-Goal-
Given a text document, a list of entity specifications and a claim description, extract all entities that match the specifications and all claims against them.

-Steps-
1. Entity specification: {entity_specs}
2. Claim description: {claim_description}
3. For each claim output (<subject>{tuple_delimiter}<object>{tuple_delimiter}<claim_type>{tuple_delimiter}<claim_status>{tuple_delimiter}<claim_start_date>{tuple_delimiter}<claim_end_date>{tuple_delimiter}<claim_description>{tuple_delimiter}<claim_source>). Status is TRUE, FALSE or SUSPECTED; dates are ISO-8601 or NONE; the object is NONE when unknown.
4. Separate records with {record_delimiter}.
5. When finished, output {completion_delimiter}

-Text-
{input_text}
Output:";

pub const CONTINUE_CLAIMS: &str =
    "MANY claims were missed in the last extraction. Add them below using the same format:";

pub const LOOP_CHECK_CLAIMS: &str =
    "It appears some claims may have still been missed. Answer YES if there are still claims that need to be added, or NO if there are none.";

pub const COMMUNITY_REPORT: &str = "\
You are an analyst writing a report about a community of entities in a knowledge graph.
Using only the entities and relationships below, return a JSON object with these fields:
  \"title\": a short specific name for the community,
  \"summary\": an executive summary of its structure and significance,
  \"rating\": a number from 0 to 10 for the impact severity of the community,
  \"rating_explanation\": one sentence explaining the rating,
  \"findings\": a list of 5 to 10 objects, each with \"summary\" and \"explanation\".

-Data-
{input_text}

Output:";
