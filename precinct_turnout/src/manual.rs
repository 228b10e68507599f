/*!

This is the long-form manual for `precinct_turnout` and `turnoutvis`.

## Input format

The input is a CSV file with a header row. The following columns are mandatory:

| column                    | content                                             |
|---------------------------|-----------------------------------------------------|
| `precinct_id`             | the identifier of the precinct                      |
| `total_registered_voters` | a non-negative integer                              |
| `votes_cast`              | a non-negative integer                              |
| `geojson_boundary`        | the outline of the precinct, as JSON                |

Any other column is carried along with the precinct. Empty lines are ignored.

Example:

```text
precinct_id,total_registered_voters,votes_cast,geojson_boundary,region
P1,100,80,"{""type"":""Feature"",""geometry"":{""type"":""Polygon"",""coordinates"":[[[0,0],[1,0],[1,1],[0,0]]]}}",North
P2,50,10,"{""type"":""Polygon"",""coordinates"":[[[1,0],[2,0],[2,1],[1,0]]]}",South
```

The boundary can be a bare geometry or a GeoJSON `Feature`. Only `Polygon` and
`MultiPolygon` geometries are drawn on the map; other geometries are accepted
but have no shape.

### Rejected files

The whole file is rejected, and nothing is displayed, when:
- one of the mandatory columns is missing. All the missing columns are reported.
- a registration or vote count is not a number. The offending precinct is reported.
- a boundary is not valid JSON. The offending precinct and row are reported.

A precinct with more votes than registered voters is accepted: it shows a turnout
above 100%, which is usually worth a closer look.

Precinct ids are not checked for uniqueness. A warning lists the repeated ids; when
looking up a precinct by id, the first one in the file is used.

## Turnout

The turnout of a precinct is `votes_cast / total_registered_voters`. It is 0 when there
are no registered voters.

## Filters

Any extra column with a small number of distinct values is offered as a filter. More
precisely, the column must have at least 2 distinct non-empty values, and strictly fewer
distinct values than half the number of precincts. A column `region` with the values
`North` and `South` is offered as a filter as soon as there are 5 precincts or more.

Each filter has the option `All`, which is the same as not filtering on that column.
Several filters are combined: a precinct is displayed if it matches all of them.

## Views

- the **map**: each precinct is coloured by turnout bracket (above 80%, 70-80%, ..., 30-40%,
  and a light yellow below).
- the **histogram**: number of precincts in each 10% bracket. Precincts above 100% are
  not in any bracket.
- the **extremes**: the 5 precincts with the highest turnout and the 5 with the lowest.

## Configuration

`turnoutvis` accepts a JSON configuration file with the `--config` flag:

```json
{
  "dataSource": { "filePath": "precincts.csv" },
  "filters": { "region": "North" },
  "insights": {
    "endpoint": "https://generativelanguage.googleapis.com/v1beta/models",
    "model": "gemini-2.0-flash",
    "apiKeyEnv": "GEMINI_API_KEY",
    "timeoutSecs": 120
  },
  "outputSettings": { "outputPath": "summary.json" }
}
```

All the sections are optional. Paths are relative to the configuration file. The
command line flags take precedence over the configuration file.

## Insights

With the `--insights` flag, the full CSV file is sent to a language model that is asked
to point out precincts with unexpectedly high or low turnout. **Do not use this option
with sensitive data: the file leaves your computer.**

*/
