//! A small Helsinki ferry feed shared by the import tests.

use std::fs;
use tempfile::TempDir;

pub const FERRY_FEED_FILES: [(&str, &str); 14] = [
    (
        "agency.txt",
        "agency_id,agency_name,agency_url,agency_timezone,agency_lang\n\
         ferry_company,Ferry Company,https://ferry.company,Europe/Helsinki,fi\n",
    ),
    (
        "routes.txt",
        "route_id,route_short_name,route_long_name,route_desc,route_type,capacity_sales\n\
         kauppatori_suomenlinna,Suomenlinna,Kauppatori - Suomenlinna,,4,2\n",
    ),
    (
        "stops.txt",
        "stop_id,stop_name,stop_desc,stop_lat,stop_lon,tts_stop_name,wheelchair_boarding\n\
         kauppatori,Kauppatori,,60.1676,24.9525,,1\n\
         suomenlinna,Suomenlinna,Sea fortress,60.1454,24.9881,,0\n",
    ),
    (
        "calendar.txt",
        "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
         weekdays,1,1,1,1,1,0,0,20210215,20210219\n",
    ),
    (
        "calendar_dates.txt",
        "service_id,date,exception_type\n\
         weekdays,20210217,2\n\
         weekdays,20210221,1\n\
         special,20210201,1\n",
    ),
    (
        "trips.txt",
        "route_id,service_id,trip_id,trip_headsign,direction_id,shape_id\n\
         kauppatori_suomenlinna,weekdays,morning,Suomenlinna,0,ferry_line\n\
         kauppatori_suomenlinna,special,evening,Kauppatori,1,\n",
    ),
    (
        "stop_times.txt",
        "trip_id,arrival_time,departure_time,stop_id,stop_sequence,stop_headsign\n\
         morning,08:00:00,08:00:00,kauppatori,1,Suomenlinna\n\
         morning,08:20:00,08:20:00,suomenlinna,2,\n\
         evening,24:10:00,24:10:00,suomenlinna,1,\n\
         evening,24:30:00,24:30:00,kauppatori,2,\n",
    ),
    (
        "shapes.txt",
        "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n\
         ferry_line,60.1454,24.9881,2\n\
         ferry_line,60.1676,24.9525,1\n",
    ),
    (
        "fare_attributes.txt",
        "fare_id,price,currency_type,payment_method,transfers,agency_id,fare_name\n\
         single,5.00,EUR,0,0,ferry_company,Single ticket\n",
    ),
    (
        "fare_rules.txt",
        "fare_id,route_id\n\
         single,kauppatori_suomenlinna\n",
    ),
    (
        "rider_categories.txt",
        "rider_category_id,rider_category_name,rider_category_description\n\
         adult,Adult,18+ years\n\
         child,Child,7-17 years\n",
    ),
    (
        "fare_rider_categories.txt",
        "fare_id,rider_category_id,price,currency_type\n\
         single,adult,5.00,EUR\n\
         single,child,2.50,EUR\n",
    ),
    (
        "translations.txt",
        "table_name,field_name,language,translation,record_id,record_sub_id,field_value\n\
         stops,stop_name,sv,Salutorget,kauppatori,,\n\
         routes,route_long_name,en,Market Square - Suomenlinna,kauppatori_suomenlinna,,\n",
    ),
    (
        "feed_info.txt",
        "feed_publisher_name,feed_publisher_url,feed_lang,feed_start_date,feed_end_date,feed_version\n\
         Ferry Company,https://ferry.company,fi,20210201,20210221,2021-02\n",
    ),
];

/// Writes the ferry feed, with `overrides` replacing or adding files.
pub fn write_feed_with(overrides: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();

    for (file_name, contents) in FERRY_FEED_FILES {
        if !overrides.iter().any(|(name, _)| *name == file_name) {
            fs::write(dir.path().join(file_name), contents).unwrap();
        }
    }

    for (file_name, contents) in overrides {
        fs::write(dir.path().join(file_name), contents).unwrap();
    }

    dir
}

/// Writes the ferry feed without the named files.
pub fn write_feed_without(missing: &[&str]) -> TempDir {
    let dir = write_ferry_feed();

    for file_name in missing {
        fs::remove_file(dir.path().join(file_name)).unwrap();
    }

    dir
}

pub fn write_ferry_feed() -> TempDir {
    write_feed_with(&[])
}

/// The ferry feed zipped inside a `gtfs/` folder, as many publishers ship it.
pub fn ferry_feed_zip_bytes() -> Vec<u8> {
    use std::io::Write;

    let mut buffer = std::io::Cursor::new(Vec::new());

    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::SimpleFileOptions::default();

        writer.add_directory("gtfs/", options).unwrap();

        for (file_name, contents) in FERRY_FEED_FILES {
            writer
                .start_file(format!("gtfs/{}", file_name), options)
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }

        writer.finish().unwrap();
    }

    buffer.into_inner()
}
